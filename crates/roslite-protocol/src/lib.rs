//! roslite Protocol - Wire protocol for discovery and registrar traffic
//!
//! Every message is a compact MessagePack map with small-integer keys.
//! This crate provides the key constants, typed views over those maps,
//! and the codec used by both the broker and the Nodes.

pub mod codec;
pub mod error;
pub mod keys;
pub mod message;

pub use codec::WireCodec;
pub use error::ProtocolError;
pub use message::{AddressPair, DiscoveryRequest, RegistrarEntry, RegistrarRequest, WireMap};
