//! The Atlas broker loop.
//!
//! One task owns everything: the discovery socket, the proxy registry and
//! the poller every socket reports into. Each iteration waits for one
//! readiness event, then drains whatever else is already queued:
//!
//! - discovery requests are validated, resolved against the registry
//!   (creating the proxy on first use) and answered with the address pair
//!   matching the requester's locality
//! - frontend traffic is handed to the backend without waiting
//! - backend traffic is handed to the frontend, waiting if needed
//!
//! Because the registry is only touched from this loop, any number of
//! concurrent lookups for one name still create exactly one proxy.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Malformed requests are logged at warn and get no reply
//! - Failed forwards are logged and the message dropped

mod proxy;
mod registry;

pub use proxy::{Bindings, Proxy};
pub use registry::{IdAllocator, ProxyKey, ProxyRegistry, Side, FIRST_ENDPOINT_ID};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use roslite_core::{Address, Kind, Locality};
use roslite_protocol::{AddressPair, DiscoveryRequest, ProtocolError, WireCodec, WireMap};
use roslite_transport::{BoundSocket, Context, Message, Poller, Readiness, SocketKind, Token};

use crate::config::AtlasConfig;
use crate::error::AtlasError;

/// Poller token of the discovery socket. Endpoint ids start well above it.
pub const DISCOVERY_TOKEN: Token = 0;

/// Events handled per wake-up before cancellation is checked again.
const MAX_EVENTS_PER_WAKE: usize = 1024;

/// The discovery broker.
pub struct Atlas {
    config: AtlasConfig,
    context: Context,
    cancel_token: CancellationToken,
    poller: Poller,
    discovery: BoundSocket,
    registry: ProxyRegistry,
    codec: WireCodec,
}

impl Atlas {
    /// Binds the discovery endpoint.
    ///
    /// Proxies are created later, on first lookup. `context` must be shared
    /// with any Node in this process that should reach Atlas in-process.
    pub async fn bind(
        config: AtlasConfig,
        context: Context,
        cancel_token: CancellationToken,
    ) -> Result<Self, AtlasError> {
        let poller = Poller::new();
        let discovery = BoundSocket::bind(
            &context,
            SocketKind::Router,
            std::slice::from_ref(&config.address),
            poller.register(DISCOVERY_TOKEN),
        )
        .await
        .map_err(AtlasError::Bind)?;

        Ok(Self {
            config,
            context,
            cancel_token,
            poller,
            discovery,
            registry: ProxyRegistry::new(),
            codec: WireCodec,
        })
    }

    /// Address the discovery endpoint is actually bound to.
    ///
    /// Differs from the configured address when a TCP port of 0 was asked
    /// for.
    pub fn local_address(&self) -> &Address {
        self.discovery
            .addresses()
            .first()
            .unwrap_or(&self.config.address)
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProxyRegistry {
        &self.registry
    }

    /// Runs until the cancellation token fires.
    #[instrument(name = "atlas", skip_all, fields(identity = %self.config.identity))]
    pub async fn run(&mut self) {
        info!(
            address = %self.local_address(),
            identity = %self.config.identity,
            "Atlas listening"
        );

        loop {
            let ready = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Atlas shutdown requested");
                    break;
                }

                ready = self.poller.wait() => ready,
            };

            let Some(ready) = ready else {
                debug!("Poller closed");
                break;
            };
            self.dispatch(ready).await;

            for _ in 1..MAX_EVENTS_PER_WAKE {
                let Some(ready) = self.poller.try_next() else {
                    break;
                };
                self.dispatch(ready).await;
            }
        }

        info!(proxies = self.registry.len(), "Atlas stopped");
    }

    async fn dispatch(&mut self, ready: Readiness) {
        if ready.token == DISCOVERY_TOKEN {
            if let Some(message) = self.discovery.handle_event(ready.event) {
                self.serve_discovery(message).await;
            }
            return;
        }

        match self.registry.endpoint_mut(ready.token) {
            Some((proxy, side)) => proxy.handle_event(side, ready.event).await,
            None => debug!(token = ready.token, "Event for unknown endpoint"),
        }
    }

    /// Answers one enveloped discovery request.
    async fn serve_discovery(&mut self, mut message: Message) {
        let Some(envelope) = message.pop_front() else {
            return;
        };

        let request = match self.decode_request(&message) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Invalid discovery request, not replying");
                return;
            }
        };

        let pair = match self.lookup(&request).await {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "Lookup failed, not replying");
                return;
            }
        };

        let payload = match self.codec.encode(&pair.to_wire()) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Failed to encode discovery response");
                return;
            }
        };

        let reply = Message::new(vec![envelope, Bytes::from(payload)]);
        if let Err(e) = self.discovery.send(reply).await {
            debug!(error = %e, "Requester went away before the reply");
        }
    }

    fn decode_request(&self, message: &Message) -> Result<DiscoveryRequest, ProtocolError> {
        let payload = message.payload().map(|p| p.as_ref()).unwrap_or_default();
        let map: WireMap = self.codec.decode(payload)?;
        DiscoveryRequest::from_wire(&map)
    }

    /// Resolves a request to the address pair its requester should use,
    /// creating the proxy on first lookup of the name.
    pub async fn lookup(&mut self, request: &DiscoveryRequest) -> Result<AddressPair, AtlasError> {
        let key = ProxyKey::new(request.kind, request.name.clone());
        let locality = Locality::classify(&request.requester, &self.config.identity);

        let pair = match self.registry.get(&key) {
            Some(proxy) => proxy.address_pair(locality),
            None => {
                let frontend_id = self.registry.next_id();
                let backend_id = self.registry.next_id();
                let proxy = Proxy::create(
                    &self.context,
                    &self.poller,
                    &self.config,
                    key,
                    frontend_id,
                    backend_id,
                )
                .await?;
                self.registry.insert(proxy).address_pair(locality)
            }
        };

        let (front_role, back_role) = match request.kind {
            Kind::Channel => ("pub", "sub"),
            Kind::Service => ("req", "rep"),
        };
        info!(
            kind = %request.kind,
            name = %request.name,
            requester = %request.requester,
            locality = locality.as_str(),
            front_role,
            front = %pair.front,
            back_role,
            back = %pair.back,
            "Lookup"
        );

        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roslite_core::{Identity, Name, Scheme};
    use roslite_protocol::keys;
    use roslite_transport::connect;
    use std::time::Duration;

    async fn test_atlas(dir: &std::path::Path) -> Atlas {
        let config = AtlasConfig::new(Address::tcp("127.0.0.1", 0), "127.0.0.1")
            .with_identity(Identity::new("127.0.0.1", 7))
            .with_ipc_dir(dir);
        Atlas::bind(config, Context::new(), CancellationToken::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_lookup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut atlas = test_atlas(dir.path()).await;
        let name = Name::new("chatter").unwrap();
        let request = DiscoveryRequest::lookup_channel(name, Identity::new("127.0.0.1", 7));

        let first = atlas.lookup(&request).await.unwrap();
        let second = atlas.lookup(&request).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(atlas.registry().len(), 1);
        assert_eq!(first.front.to_string(), "inproc://id1000");
        assert_eq!(first.back.to_string(), "inproc://id1001");
    }

    #[tokio::test]
    async fn test_channel_and_service_namespaces_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        let mut atlas = test_atlas(dir.path()).await;
        let name = Name::new("registrar").unwrap();
        let requester = Identity::new("127.0.0.1", 7);

        let channel = atlas
            .lookup(&DiscoveryRequest::lookup_channel(name.clone(), requester.clone()))
            .await
            .unwrap();
        let service = atlas
            .lookup(&DiscoveryRequest::lookup_service(name, requester))
            .await
            .unwrap();

        assert_ne!(channel.front, service.front);
        assert_eq!(atlas.registry().count(Kind::Channel), 1);
        assert_eq!(atlas.registry().count(Kind::Service), 1);
    }

    #[tokio::test]
    async fn test_locality_selects_transport() {
        let dir = tempfile::tempdir().unwrap();
        let mut atlas = test_atlas(dir.path()).await;
        let name = Name::new("echo").unwrap();

        let cases = [
            (Identity::new("127.0.0.1", 7), Scheme::Inproc),
            (Identity::new("127.0.0.1", 8), Scheme::Ipc),
            (Identity::new("10.1.2.3", 7), Scheme::Tcp),
        ];
        for (requester, scheme) in cases {
            let pair = atlas
                .lookup(&DiscoveryRequest::lookup_service(name.clone(), requester))
                .await
                .unwrap();
            assert_eq!(pair.front.scheme(), scheme);
            assert_eq!(pair.back.scheme(), scheme);
        }
        assert_eq!(atlas.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_request_gets_no_reply_and_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let atlas = test_atlas(dir.path()).await;
        let context = atlas.context.clone();
        let cancel = atlas.cancel_token.clone();
        let address = atlas.local_address().clone();

        let handle = tokio::spawn(async move {
            let mut atlas = atlas;
            atlas.run().await;
            atlas
        });

        let mut link = connect(&context, &address).await.unwrap();
        let mut map = WireMap::new();
        map.insert(keys::REQUEST, serde_json::Value::from(keys::LOOKUP_CHANNEL));
        map.insert(keys::CHANNEL, serde_json::Value::from(""));
        map.insert(keys::INTERFACE, serde_json::Value::from("127.0.0.1"));
        map.insert(keys::PID, serde_json::Value::from(7));
        let payload = WireCodec.encode(&map).unwrap();
        link.send(Message::single(payload)).await.unwrap();

        let reply = tokio::time::timeout(Duration::from_millis(200), link.recv()).await;
        assert!(reply.is_err(), "malformed request must not be answered");

        cancel.cancel();
        let atlas = handle.await.unwrap();
        assert!(atlas.registry().is_empty());
    }
}
