//! Value serialization
//!
//! The store never looks inside serialized bytes; a [`Codec`] turns typed
//! values into bytes and back. Equal values should encode to equal bytes or
//! deduplication is lost, though correctness is not.

use cairn_core::{CoreResult, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serializes typed values to bytes and back
pub trait Codec: Send + Sync + 'static {
    /// Serialize a value
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> CoreResult<Vec<u8>>;

    /// Deserialize a value
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CoreResult<T>;
}

/// Compact JSON via serde_json
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> CoreResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| StoreError::codec("Failed to serialize value", e))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CoreResult<T> {
        serde_json::from_slice(bytes).map_err(|e| {
            StoreError::codec(
                format!("Failed to deserialize {}", std::any::type_name::<T>()),
                e,
            )
        })
    }
}
