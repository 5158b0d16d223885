//! Raw byte storage backends
//!
//! A backend persists and retrieves serialized bytes keyed by [`Checksum`].
//! It never interprets the bytes.

use async_trait::async_trait;
use cairn_core::{Checksum, CoreResult, StoreError};
use std::fmt;
use std::io::Cursor;

pub mod file;
pub mod memory;

// Re-export main types
pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Pluggable raw byte persistence
///
/// Implementations must satisfy these invariants:
/// - `ensure_persisted` is idempotent: content already stored under the
///   checksum is a successful no-op, never an error.
/// - `try_get` reports absence as [`StorageResult::NotFound`], not as an error.
/// - Content is immutable once written.
#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    /// Short label used in log events
    fn name(&self) -> &str;

    /// Read the bytes stored under `checksum`
    async fn try_get(&self, checksum: &Checksum) -> CoreResult<StorageResult>;

    /// Durably store `bytes` under `checksum` unless already present
    async fn ensure_persisted(&self, checksum: &Checksum, bytes: &[u8]) -> CoreResult<()>;
}

/// Outcome of a backend read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageResult {
    /// The backend holds content for the checksum
    Found(Vec<u8>),
    /// The backend has nothing stored for the checksum
    NotFound,
}

impl StorageResult {
    /// Check if the backend held content
    pub fn contains(&self) -> bool {
        matches!(self, StorageResult::Found(_))
    }

    /// Borrow the stored bytes
    pub fn bytes(&self) -> CoreResult<&[u8]> {
        match self {
            StorageResult::Found(bytes) => Ok(bytes),
            StorageResult::NotFound => Err(StoreError::does_not_contain(None)),
        }
    }

    /// Take the stored bytes
    pub fn into_bytes(self) -> CoreResult<Vec<u8>> {
        match self {
            StorageResult::Found(bytes) => Ok(bytes),
            StorageResult::NotFound => Err(StoreError::does_not_contain(None)),
        }
    }

    /// Stored bytes as a readable stream
    pub fn into_reader(self) -> CoreResult<Cursor<Vec<u8>>> {
        self.into_bytes().map(Cursor::new)
    }
}
