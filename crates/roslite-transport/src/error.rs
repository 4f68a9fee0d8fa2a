use std::io;

use thiserror::Error;

/// Errors that can occur while binding, connecting or moving frames.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Address already in use: {address}")]
    AddressInUse { address: String },

    /// In-process connect to a name nobody has bound
    #[error("Nothing is bound at {address}")]
    NotBound { address: String },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Connection closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Why a bound socket could not hand a message to its peers.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// A peer queue is full; the message was not delivered there
    #[error("Peer queue full, message dropped")]
    WouldBlock,

    /// No peer is connected to take the message
    #[error("No peers connected")]
    NoPeers,

    /// Router message with a missing or unknown peer envelope
    #[error("Message cannot be routed to a connected peer")]
    Unroutable,
}
