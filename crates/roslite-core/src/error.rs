//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur when building domain values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Channel or service name was empty
    #[error("Name must not be empty")]
    EmptyName,

    /// Address string has no recognised scheme
    #[error("Unsupported address scheme in {address:?} (expected inproc://, ipc:// or tcp://)")]
    UnsupportedScheme { address: String },

    /// Address string is structurally invalid
    #[error("Invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
