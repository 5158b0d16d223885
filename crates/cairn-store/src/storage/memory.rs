//! In-memory storage backend

use async_trait::async_trait;
use cairn_core::{Checksum, CoreResult};
use dashmap::DashMap;
use tracing::debug;

use super::{Storage, StorageResult};

/// `DashMap`-backed backend for tests and embedding
///
/// Content lives as long as the backend value; nothing reaches disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: DashMap<Checksum, Vec<u8>>,
}

impl MemoryStorage {
    /// Create an empty backend
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
        }
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Check if content is stored under `checksum`
    pub fn contains(&self, checksum: &Checksum) -> bool {
        self.objects.contains_key(checksum)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn try_get(&self, checksum: &Checksum) -> CoreResult<StorageResult> {
        Ok(match self.objects.get(checksum) {
            Some(bytes) => StorageResult::Found(bytes.value().clone()),
            None => StorageResult::NotFound,
        })
    }

    async fn ensure_persisted(&self, checksum: &Checksum, bytes: &[u8]) -> CoreResult<()> {
        // First writer wins; content for a checksum never changes.
        self.objects
            .entry(checksum.clone())
            .or_insert_with(|| bytes.to_vec());
        debug!(%checksum, "memory backend holds content");
        Ok(())
    }
}
