//! The discovery client.

use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use roslite_core::{Address, Identity, Kind, Name};
use roslite_protocol::{
    AddressPair, DiscoveryRequest, RegistrarEntry, RegistrarRequest, WireCodec, WireMap,
};
use roslite_transport::{connect, Context, Link, Message};

use crate::cache::DiscoveryCache;
use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::handles::{Provider, Publisher, Requester, Subscriber};

/// Receive bound used by [`Node::request_service`] callers that have no
/// better value, and by the registrar helpers.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(100);

/// Service (and channel) name of the registrar.
pub const DEFAULT_REGISTRAR: &str = "registrar";

/// A participant that resolves names through Atlas.
///
/// Nodes that share a [`Context`] with Atlas (or with each other) can use
/// in-process links; the context is the only state they share.
pub struct Node {
    config: NodeConfig,
    context: Context,
    cancel_token: CancellationToken,
    atlas: Link,
    cache: DiscoveryCache,
}

impl Node {
    /// Opens the discovery link to Atlas.
    ///
    /// Nothing is sent until the first lookup.
    pub async fn connect(
        config: NodeConfig,
        context: Context,
        cancel_token: CancellationToken,
    ) -> Result<Self> {
        let atlas = connect(&context, &config.atlas)
            .await
            .map_err(|source| NodeError::AtlasUnreachable {
                address: config.atlas.to_string(),
                source,
            })?;

        debug!(atlas = %config.atlas, identity = %config.identity, "Node connected to Atlas");

        Ok(Self {
            config,
            context,
            cancel_token,
            atlas,
            cache: DiscoveryCache::new(),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.config.identity
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn cache(&self) -> &DiscoveryCache {
        &self.cache
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    // ========================================================================
    // Primitives
    // ========================================================================

    /// Connects a publisher to a channel's publish address.
    pub async fn publish(&mut self, channel: &str) -> Result<Publisher> {
        let channel = Name::new(channel)?;
        let pair = self.resolve(Kind::Channel, &channel).await?;
        let link = self.open(&pair.front).await?;
        info!(channel = %channel, publish_address = %pair.front, "Publishing");
        Ok(Publisher::new(channel, link, self.cancel_token.clone()))
    }

    /// Connects a subscriber, receiving everything, to a channel.
    pub async fn subscribe(&mut self, channel: &str) -> Result<Subscriber> {
        let channel = Name::new(channel)?;
        let pair = self.resolve(Kind::Channel, &channel).await?;
        let link = self.open(&pair.back).await?;
        info!(channel = %channel, subscribe_address = %pair.back, "Subscribing");
        Ok(Subscriber::new(channel, link, self.cancel_token.clone()))
    }

    /// Connects a requester to a service; each reply is awaited for at most
    /// `timeout`.
    pub async fn request_service(&mut self, service: &str, timeout: Duration) -> Result<Requester> {
        let service = Name::new(service)?;
        let pair = self.resolve(Kind::Service, &service).await?;
        let link = self.open(&pair.front).await?;
        info!(service = %service, request_address = %pair.front, "Getting service");
        Ok(Requester::new(
            service,
            link,
            timeout,
            self.cancel_token.clone(),
        ))
    }

    /// Connects a provider to a service's reply address.
    pub async fn provide_service(&mut self, service: &str) -> Result<Provider> {
        let service = Name::new(service)?;
        let pair = self.resolve(Kind::Service, &service).await?;
        let link = self.open(&pair.back).await?;
        info!(service = %service, reply_address = %pair.back, "Providing service");
        Ok(Provider::new(service, link, self.cancel_token.clone()))
    }

    // ========================================================================
    // Registrar helpers
    // ========================================================================

    /// Stores `value` under `key` in the registrar.
    ///
    /// Returns the value the registrar acknowledged, or `None` if it
    /// rejected the request.
    pub async fn set_value(
        &mut self,
        key: &str,
        value: Value,
        registrar: &str,
    ) -> Result<Option<Value>> {
        let request = RegistrarRequest::set(key, value);
        self.registrar_exchange(request, registrar).await
    }

    /// Reads the value stored under `key`; `None` if there is none.
    pub async fn get_value(&mut self, key: &str, registrar: &str) -> Result<Option<Value>> {
        let request = RegistrarRequest::get(key);
        self.registrar_exchange(request, registrar).await
    }

    async fn registrar_exchange(
        &mut self,
        request: RegistrarRequest,
        registrar: &str,
    ) -> Result<Option<Value>> {
        let mut requester = self
            .request_service(registrar, DEFAULT_REQUEST_TIMEOUT)
            .await?;
        let reply: Option<WireMap> = requester.request_message(&request.to_wire()).await?;

        match reply {
            Some(map) => {
                let entry = RegistrarEntry::from_wire(&map)?;
                Ok(Some(entry.value).filter(|value| !value.is_null()))
            }
            None => Ok(None),
        }
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    /// Returns the cached pair for a name, asking Atlas on first use.
    #[instrument(level = "debug", skip(self), fields(node = %self.config.identity))]
    async fn resolve(&mut self, kind: Kind, name: &Name) -> Result<AddressPair> {
        if let Some(pair) = self.cache.get(kind, name) {
            return Ok(pair.clone());
        }

        let request = DiscoveryRequest {
            kind,
            name: name.clone(),
            requester: self.config.identity.clone(),
        };
        let payload = WireCodec.encode(&request.to_wire())?;

        // Drop any answer to a lookup that was interrupted earlier.
        while self.atlas.try_recv().is_some() {
            debug!("Discarding stale Atlas reply");
        }

        tokio::select! {
            _ = self.cancel_token.cancelled() => return Err(NodeError::Interrupted),
            result = self.atlas.send(Message::single(payload)) => {
                result.map_err(|_| NodeError::AtlasClosed)?
            }
        }

        let reply = tokio::select! {
            _ = self.cancel_token.cancelled() => return Err(NodeError::Interrupted),
            reply = self.atlas.recv() => reply.ok_or(NodeError::AtlasClosed)?,
        };

        let payload = reply.payload().cloned().unwrap_or_default();
        let map: WireMap = WireCodec.decode(&payload)?;
        let pair = AddressPair::from_wire(kind, &map)?;

        debug!(kind = %kind, name = %name, front = %pair.front, back = %pair.back, "Resolved");
        Ok(self.cache.insert(kind, name.clone(), pair).clone())
    }

    async fn open(&self, address: &Address) -> Result<Link> {
        connect(&self.context, address)
            .await
            .map_err(|source| NodeError::Connect {
                address: address.to_string(),
                source,
            })
    }
}
