//! MessagePack codec shared by the broker and every Node.
//!
//! `WireCodec` is the structured get/put-message capability: it is a
//! plain value handed to whoever needs to turn typed messages into bytes
//! and back, rather than behavior inherited from a common base.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ProtocolError;

/// Encodes and decodes MessagePack payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireCodec;

impl WireCodec {
    /// Encode a value into bytes
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        Ok(rmp_serde::to_vec(value)?)
    }

    /// Decode bytes into a value
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, ProtocolError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
