//! Content-Addressed Store for Immutable Values
//!
//! A value is serialized once, hashed with SHA-512 and written to every
//! configured backend. Later reads are by [`Checksum`]. An in-memory result
//! cache collapses duplicate persists and reads of the same content into a
//! single shared [`Persisted`] instance.

pub mod cache;
pub mod codec;
pub mod storage;
pub mod store;
pub mod validate;

// Re-export main types
pub use cache::{CachePolicy, CacheStats, StoreResultCache};
pub use codec::{Codec, JsonCodec};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageResult};
pub use store::{Persisted, Store, StoreBuilder, StoreResult};
pub use validate::{DenyList, Validator};

pub use cairn_config::ReadFailureMode;
pub use cairn_core::{Checksum, ChecksumInterner, CoreResult, StoreError};
