//! Forwarding proxies.
//!
//! A proxy is a frontend/backend socket pair for one (kind, name):
//!
//! ```text
//! channel:  publishers ──▶ frontend (fan-in)  ══▶ backend (fan-out) ──▶ subscribers
//! service:  requesters ◀─▶ frontend (router)  ◀═▶ backend (dealer)  ◀─▶ providers
//! ```
//!
//! Frontend to backend never waits: if the backend cannot take a message
//! it is dropped. Backend to frontend (service replies) waits for space.

use roslite_core::{Address, Kind, Locality, Scheme};
use roslite_protocol::AddressPair;
use roslite_transport::{
    BoundSocket, Context, Message, Poller, SendError, SocketEvent, SocketKind, Token,
    TransportError,
};
use tracing::{debug, info, trace};

use super::registry::{ProxyKey, Side};
use crate::config::AtlasConfig;
use crate::error::AtlasError;

/// The three addresses one endpoint is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bindings {
    pub inproc: Address,
    pub ipc: Address,
    pub tcp: Address,
}

impl Bindings {
    /// The binding a requester of the given locality can reach.
    pub fn for_locality(&self, locality: Locality) -> &Address {
        match locality {
            Locality::SameProcess => &self.inproc,
            Locality::SameHost => &self.ipc,
            Locality::CrossHost => &self.tcp,
        }
    }
}

/// One bound endpoint of a proxy.
struct Endpoint {
    id: u64,
    socket: BoundSocket,
    bindings: Bindings,
}

impl Endpoint {
    async fn bind(
        context: &Context,
        poller: &Poller,
        config: &AtlasConfig,
        kind: SocketKind,
        id: u64,
    ) -> Result<Self, TransportError> {
        let inproc = Address::inproc_for_id(id);
        let ipc = Address::ipc_for_id(&config.ipc_dir, config.identity.pid, id);
        let tcp = Address::tcp(config.identity.interface.clone(), 0);

        let socket = BoundSocket::bind(
            context,
            kind,
            &[inproc.clone(), ipc.clone(), tcp.clone()],
            poller.register(id),
        )
        .await?;

        // Port 0 was requested; pick up the one the OS assigned.
        let tcp = socket
            .addresses()
            .iter()
            .find(|address| address.scheme() == Scheme::Tcp)
            .cloned()
            .unwrap_or(tcp);

        Ok(Self {
            id,
            socket,
            bindings: Bindings { inproc, ipc, tcp },
        })
    }
}

/// Frontend/backend forwarding pair for one name.
pub struct Proxy {
    key: ProxyKey,
    frontend: Endpoint,
    backend: Endpoint,
}

impl Proxy {
    /// Binds both endpoints on all three transports.
    pub(crate) async fn create(
        context: &Context,
        poller: &Poller,
        config: &AtlasConfig,
        key: ProxyKey,
        frontend_id: u64,
        backend_id: u64,
    ) -> Result<Self, AtlasError> {
        let (front_kind, back_kind) = match key.kind {
            Kind::Channel => (SocketKind::FanIn, SocketKind::FanOut),
            Kind::Service => (SocketKind::Router, SocketKind::Dealer),
        };

        let creation_error = |source| AtlasError::ProxyCreation {
            kind: key.kind,
            name: key.name.clone(),
            source,
        };

        let frontend = Endpoint::bind(context, poller, config, front_kind, frontend_id)
            .await
            .map_err(creation_error)?;
        let backend = Endpoint::bind(context, poller, config, back_kind, backend_id)
            .await
            .map_err(creation_error)?;

        info!(
            proxy = %key,
            frontend_inproc = %frontend.bindings.inproc,
            frontend_ipc = %frontend.bindings.ipc,
            frontend_tcp = %frontend.bindings.tcp,
            backend_inproc = %backend.bindings.inproc,
            backend_ipc = %backend.bindings.ipc,
            backend_tcp = %backend.bindings.tcp,
            "Created proxy"
        );

        Ok(Self {
            key,
            frontend,
            backend,
        })
    }

    pub fn key(&self) -> &ProxyKey {
        &self.key
    }

    pub fn kind(&self) -> Kind {
        self.key.kind
    }

    /// Endpoint id, which is also the poller token of that side.
    pub fn token(&self, side: Side) -> Token {
        self.endpoint(side).id
    }

    pub fn bindings(&self, side: Side) -> &Bindings {
        &self.endpoint(side).bindings
    }

    /// Number of peers currently connected to one side.
    pub fn peer_count(&self, side: Side) -> usize {
        self.endpoint(side).socket.peer_count()
    }

    /// Role-tagged addresses for a requester of the given locality.
    pub fn address_pair(&self, locality: Locality) -> AddressPair {
        AddressPair::new(
            self.key.kind,
            self.frontend.bindings.for_locality(locality).clone(),
            self.backend.bindings.for_locality(locality).clone(),
        )
    }

    fn endpoint(&self, side: Side) -> &Endpoint {
        match side {
            Side::Frontend => &self.frontend,
            Side::Backend => &self.backend,
        }
    }

    fn endpoint_mut(&mut self, side: Side) -> &mut Endpoint {
        match side {
            Side::Frontend => &mut self.frontend,
            Side::Backend => &mut self.backend,
        }
    }

    /// Applies a poller event to one side and forwards whatever message it
    /// produced to the other side.
    pub(crate) async fn handle_event(&mut self, side: Side, event: SocketEvent) {
        let Some(message) = self.endpoint_mut(side).socket.handle_event(event) else {
            return;
        };

        match side {
            Side::Frontend => self.forward_to_backend(message),
            Side::Backend => self.forward_to_frontend(message).await,
        }
    }

    fn forward_to_backend(&mut self, message: Message) {
        match self.backend.socket.try_send(message) {
            Ok(()) => trace!(proxy = %self.key, "Forwarded to backend"),
            Err(SendError::WouldBlock) | Err(SendError::NoPeers) => {
                debug!(proxy = %self.key, "Backend not available, message dropped");
            }
            Err(e) => debug!(proxy = %self.key, error = %e, "Forward to backend failed"),
        }
    }

    async fn forward_to_frontend(&mut self, message: Message) {
        if self.key.kind == Kind::Channel {
            trace!(proxy = %self.key, "Ignoring message from subscriber");
            return;
        }

        match self.frontend.socket.send(message).await {
            Ok(()) => trace!(proxy = %self.key, "Forwarded to frontend"),
            Err(e) => debug!(proxy = %self.key, error = %e, "Reply dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roslite_core::{Identity, Name};

    fn config(dir: &std::path::Path) -> AtlasConfig {
        AtlasConfig::new(Address::tcp("127.0.0.1", 0), "127.0.0.1")
            .with_identity(Identity::new("127.0.0.1", 7))
            .with_ipc_dir(dir)
    }

    #[tokio::test]
    async fn test_create_binds_three_transports_per_side() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new();
        let poller = Poller::new();
        let key = ProxyKey::new(Kind::Channel, Name::new("chatter").unwrap());

        let proxy = Proxy::create(&ctx, &poller, &config(dir.path()), key, 1000, 1001)
            .await
            .unwrap();

        let front = proxy.bindings(Side::Frontend);
        assert_eq!(front.inproc.to_string(), "inproc://id1000");
        assert_eq!(front.ipc, Address::Ipc(dir.path().join("atlas7id1000")));
        assert!(matches!(&front.tcp, Address::Tcp { port, .. } if *port != 0));

        let back = proxy.bindings(Side::Backend);
        assert_eq!(back.inproc.to_string(), "inproc://id1001");
        assert_eq!(proxy.token(Side::Frontend), 1000);
        assert_eq!(proxy.token(Side::Backend), 1001);
        assert_eq!(ctx.inproc_count(), 2);
    }

    #[tokio::test]
    async fn test_address_pair_follows_locality() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new();
        let poller = Poller::new();
        let key = ProxyKey::new(Kind::Service, Name::new("echo").unwrap());
        let proxy = Proxy::create(&ctx, &poller, &config(dir.path()), key, 1000, 1001)
            .await
            .unwrap();

        let cases = [
            (Locality::SameProcess, Scheme::Inproc),
            (Locality::SameHost, Scheme::Ipc),
            (Locality::CrossHost, Scheme::Tcp),
        ];
        for (locality, scheme) in cases {
            let pair = proxy.address_pair(locality);
            assert_eq!(pair.kind, Kind::Service);
            assert_eq!(pair.front.scheme(), scheme, "{}", locality.as_str());
            assert_eq!(pair.back.scheme(), scheme, "{}", locality.as_str());
            assert_ne!(pair.front, pair.back);
        }
    }
}
