//! Error types for the discovery client.

use std::time::Duration;

use roslite_core::{DomainError, Name};
use roslite_protocol::ProtocolError;
use roslite_transport::TransportError;
use thiserror::Error;

// ============================================================================
// Node Error Type
// ============================================================================

/// Errors raised by a [`crate::Node`] or one of its handles.
#[derive(Error, Debug)]
pub enum NodeError {
    /// Atlas could not be reached at its configured address
    #[error("Failed to connect to Atlas at {address}: {source}")]
    AtlasUnreachable {
        address: String,
        #[source]
        source: TransportError,
    },

    /// The link to Atlas closed before a reply arrived
    #[error("Atlas connection closed")]
    AtlasClosed,

    /// A resolved address could not be connected
    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: TransportError,
    },

    #[error("Invalid name: {0}")]
    InvalidName(#[from] DomainError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The proxy side of a handle went away
    #[error("Connection to {name} closed")]
    Closed { name: Name },

    /// No reply within the requester's bound
    #[error("No reply from service {service} within {timeout:?}")]
    Timeout { service: Name, timeout: Duration },

    /// `reply` without a received request to answer
    #[error("No pending request to reply to on service {service}")]
    NoPendingRequest { service: Name },

    /// The cancellation token fired while waiting
    #[error("Interrupted")]
    Interrupted,
}

/// Result type alias for Node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
