//! roslite Core - Shared types for channel/service discovery
//!
//! This crate provides the domain types shared between the discovery
//! broker (atlas), the discovery client (roslite-node) and the transport
//! layer.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod address;
pub mod error;
pub mod locality;
pub mod name;

// Re-exports for convenience
pub use address::{Address, Scheme};
pub use error::{DomainError, DomainResult};
pub use locality::{Identity, Locality};
pub use name::{Kind, Name};
