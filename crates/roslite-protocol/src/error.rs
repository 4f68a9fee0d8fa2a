use roslite_core::Kind;
use thiserror::Error;

/// Errors raised while encoding, decoding or validating wire messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Request kind missing or not one this receiver understands
    #[error("Unknown request kind: {0}")]
    UnknownRequest(String),

    /// Lookup without a usable channel/service name
    #[error("No {kind} given to lookup")]
    MissingName { kind: Kind },

    #[error("Missing field {field}")]
    MissingField { field: &'static str },

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}
