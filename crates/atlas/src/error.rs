use roslite_core::{Kind, Name};
use roslite_protocol::ProtocolError;
use roslite_transport::TransportError;
use thiserror::Error;

/// Errors that can occur while starting Atlas or materializing proxies.
#[derive(Error, Debug)]
pub enum AtlasError {
    /// The discovery endpoint could not be bound
    #[error("Failed to bind discovery endpoint: {0}")]
    Bind(#[source] TransportError),

    /// A proxy endpoint could not be bound on one of its transports
    #[error("Failed to create proxy for {kind} {name}: {source}")]
    ProxyCreation {
        kind: Kind,
        name: Name,
        #[source]
        source: TransportError,
    },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
