//! File-based storage backend
//!
//! Content for a checksum lives in `<root>/<base32(digest)>.dat`, exactly the
//! serialized bytes with no header or footer. Files are never rewritten: a
//! write lands in a private temporary file first and is published with a
//! create-only hard link, so concurrent writers of the same checksum (in this
//! process or another one sharing the directory) cannot corrupt it and readers
//! never observe a partial file. On filesystems without hard links the
//! content is written in place with a create-only open instead, which keeps
//! the no-rewrite guarantee but lets a racing reader see a short file.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use camino::{Utf8Path, Utf8PathBuf};
use cairn_core::{Checksum, CoreResult, StoreError};
use dashmap::DashSet;
use sha2::{Digest, Sha512};
use std::fs;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{Storage, StorageResult};

const FILE_EXTENSION: &str = "dat";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Backend keeping one immutable file per checksum under a root directory
#[derive(Debug)]
pub struct FileStorage {
    /// Directory holding the content files
    root: Utf8PathBuf,
    /// Checksums already confirmed present on disk
    known: DashSet<Checksum>,
    /// Re-hash content on read
    verify_reads: bool,
}

impl FileStorage {
    /// Create a file backend, creating `root` if it does not exist
    pub fn new<P: AsRef<Utf8Path>>(root: P) -> CoreResult<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(&root)
            .map_err(|e| StoreError::io(format!("Failed to create store directory {}", root), e))?;

        Ok(Self {
            root,
            known: DashSet::new(),
            verify_reads: false,
        })
    }

    /// Recompute the checksum of content on every read
    pub fn with_verification(mut self, verify_reads: bool) -> Self {
        self.verify_reads = verify_reads;
        self
    }

    /// Get the root directory
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Get the storage path for a checksum
    pub fn path_for(&self, checksum: &Checksum) -> Utf8PathBuf {
        self.root
            .join(format!("{}.{}", checksum.to_base32(), FILE_EXTENSION))
    }

    /// Number of checksums confirmed present without touching the disk
    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    fn temp_path_for(&self, checksum: &Checksum) -> Utf8PathBuf {
        let sequence = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            ".{}.{}-{}.tmp",
            checksum.to_base32(),
            std::process::id(),
            sequence
        ))
    }

    fn mark_as_exists(&self, checksum: &Checksum) {
        self.known.insert(checksum.clone());
    }

    // Hashes without interning; a corrupt file must not leave its digest
    // registered.
    fn verify(&self, checksum: &Checksum, content: &[u8]) -> CoreResult<()> {
        let actual = if content.is_empty() {
            "<empty>".to_string()
        } else {
            let computed = Sha512::digest(content);
            if computed.as_slice() == checksum.as_bytes().as_slice() {
                return Ok(());
            }
            STANDARD.encode(computed)
        };
        Err(StoreError::Corrupt {
            checksum: checksum.to_string(),
            actual,
        })
    }

    async fn write_temp(&self, temp_path: &Utf8Path, bytes: &[u8]) -> CoreResult<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(temp_path)
            .await
            .map_err(|e| StoreError::io(format!("Failed to create {}", temp_path), e))?;

        file.write_all(bytes)
            .await
            .map_err(|e| StoreError::io(format!("Failed to write {}", temp_path), e))?;
        file.sync_all()
            .await
            .map_err(|e| StoreError::io(format!("Failed to sync {}", temp_path), e))?;

        Ok(())
    }

    /// Create-only write straight to `path`, for filesystems without hard
    /// links. Readers racing the write can see a short file.
    async fn write_in_place(&self, path: &Utf8Path, bytes: &[u8]) -> CoreResult<()> {
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await;

        let mut file = match opened {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(()),
            Err(e) => return Err(StoreError::io(format!("Failed to create {}", path), e)),
        };

        let written = async {
            file.write_all(bytes).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            // A partial file would be served as content
            let _ = tokio::fs::remove_file(path).await;
            return Err(StoreError::io(format!("Failed to write {}", path), e));
        }

        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    fn name(&self) -> &str {
        "file"
    }

    async fn try_get(&self, checksum: &Checksum) -> CoreResult<StorageResult> {
        let path = self.path_for(checksum);

        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            // Vanished or never written
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StorageResult::NotFound),
            Err(e) => {
                return Err(StoreError::io(format!("Failed to read content file {}", path), e))
            }
        };

        if self.verify_reads {
            self.verify(checksum, &content)?;
        }

        self.mark_as_exists(checksum);
        debug!(%checksum, path = %path, "read content file");
        Ok(StorageResult::Found(content))
    }

    async fn ensure_persisted(&self, checksum: &Checksum, bytes: &[u8]) -> CoreResult<()> {
        if self.known.contains(checksum) {
            return Ok(());
        }

        let path = self.path_for(checksum);

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(format!("Failed to check {}", path), e))?;
        if exists {
            self.mark_as_exists(checksum);
            return Ok(());
        }

        let temp_path = self.temp_path_for(checksum);
        if let Err(e) = self.write_temp(&temp_path, bytes).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }

        let published = tokio::fs::hard_link(&temp_path, &path).await;
        // The temporary name is private to this call; losing it is harmless.
        let _ = tokio::fs::remove_file(&temp_path).await;

        match published {
            Ok(()) => debug!(%checksum, path = %path, "wrote content file"),
            // Another writer published the same content first
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(%checksum, path = %path, "content file already present")
            }
            Err(e) if e.kind() == ErrorKind::Unsupported => {
                debug!(%checksum, path = %path, "hard links unsupported, writing in place");
                self.write_in_place(&path, bytes).await?;
            }
            Err(e) => {
                return Err(StoreError::io(
                    format!("Failed to publish content file {}", path),
                    e,
                ))
            }
        }

        self.mark_as_exists(checksum);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn storage_in(temp_dir: &tempfile::TempDir) -> FileStorage {
        let root = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).unwrap();
        FileStorage::new(&root).unwrap()
    }

    fn dir_entries(root: &Utf8Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(root)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_creates_root_directory() {
        let temp_dir = tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp_dir.path().join("nested/store")).unwrap();

        let storage = FileStorage::new(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(storage.root(), root.as_path());
    }

    #[test]
    fn test_path_layout() {
        let temp_dir = tempdir().unwrap();
        let storage = storage_in(&temp_dir);
        let checksum = Checksum::calculate(&[0u8]).unwrap();

        let path = storage.path_for(&checksum);
        assert_eq!(path.parent().unwrap(), storage.root());
        assert_eq!(path.extension(), Some("dat"));
        assert_eq!(path.file_stem().unwrap(), checksum.to_base32());
    }

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let temp_dir = tempdir().unwrap();
        let storage = storage_in(&temp_dir);
        let checksum = Checksum::calculate(b"hello world").unwrap();

        storage.ensure_persisted(&checksum, b"hello world").await.unwrap();

        let on_disk = fs::read(storage.path_for(&checksum)).unwrap();
        assert_eq!(on_disk, b"hello world");

        let result = storage.try_get(&checksum).await.unwrap();
        assert_eq!(result, StorageResult::Found(b"hello world".to_vec()));
    }

    #[tokio::test]
    async fn test_missing_is_not_found_without_side_effects() {
        let temp_dir = tempdir().unwrap();
        let storage = storage_in(&temp_dir);
        let checksum = Checksum::calculate(b"never written").unwrap();

        let result = storage.try_get(&checksum).await.unwrap();
        assert_eq!(result, StorageResult::NotFound);
        assert!(dir_entries(storage.root()).is_empty());
        assert_eq!(storage.known_count(), 0);
    }

    #[tokio::test]
    async fn test_existing_file_is_not_rewritten() {
        let temp_dir = tempdir().unwrap();
        let storage = storage_in(&temp_dir);
        let checksum = Checksum::calculate(b"original").unwrap();

        storage.ensure_persisted(&checksum, b"original").await.unwrap();
        storage.ensure_persisted(&checksum, b"imposter").await.unwrap();

        // A second backend instance has an empty known set and must check disk
        let fresh = FileStorage::new(storage.root()).unwrap();
        fresh.ensure_persisted(&checksum, b"imposter").await.unwrap();

        let on_disk = fs::read(storage.path_for(&checksum)).unwrap();
        assert_eq!(on_disk, b"original");
        assert_eq!(dir_entries(storage.root()).len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writes_leave_one_file() {
        let temp_dir = tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).unwrap();
        let content = vec![0xABu8; 64 * 1024];
        let checksum = Checksum::calculate(&content).unwrap();

        // Separate instances so the known set cannot short-circuit
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let storage = Arc::new(FileStorage::new(&root).unwrap());
                let checksum = checksum.clone();
                let content = content.clone();
                tokio::spawn(async move { storage.ensure_persisted(&checksum, &content).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let entries = dir_entries(&root);
        assert_eq!(entries, vec![format!("{}.dat", checksum.to_base32())]);
        assert_eq!(fs::read(root.join(&entries[0])).unwrap(), content);
    }

    #[tokio::test]
    async fn test_known_set_tracks_reads_and_writes() {
        let temp_dir = tempdir().unwrap();
        let storage = storage_in(&temp_dir);
        let written = Checksum::calculate(b"written").unwrap();
        let read_back = Checksum::calculate(b"read back").unwrap();

        storage.ensure_persisted(&written, b"written").await.unwrap();
        assert_eq!(storage.known_count(), 1);

        fs::write(storage.path_for(&read_back), b"read back").unwrap();
        storage.try_get(&read_back).await.unwrap();
        assert_eq!(storage.known_count(), 2);
    }

    #[tokio::test]
    async fn test_verification_detects_corruption() {
        let temp_dir = tempdir().unwrap();
        let storage = storage_in(&temp_dir).with_verification(true);
        let checksum = Checksum::calculate(b"genuine").unwrap();

        fs::write(storage.path_for(&checksum), b"tampered").unwrap();

        let err = storage.try_get(&checksum).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));

        fs::write(storage.path_for(&checksum), b"").unwrap();
        let err = storage.try_get(&checksum).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref actual, .. } if actual == "<empty>"));

        fs::write(storage.path_for(&checksum), b"genuine").unwrap();
        assert!(storage.try_get(&checksum).await.unwrap().contains());
    }

    #[tokio::test]
    async fn test_corrupt_digest_is_not_interned() {
        let temp_dir = tempdir().unwrap();
        let storage = storage_in(&temp_dir).with_verification(true);
        let checksum = Checksum::calculate(b"expected content").unwrap();
        let tampered = b"content that only ever exists on a corrupted disk";

        fs::write(storage.path_for(&checksum), tampered).unwrap();

        let digest = Sha512::digest(tampered);
        let err = storage.try_get(&checksum).await.unwrap_err();
        assert!(
            matches!(err, StoreError::Corrupt { ref actual, .. } if *actual == STANDARD.encode(&digest))
        );
        assert!(!cairn_core::ChecksumInterner::global().contains(&digest));
    }

    #[tokio::test]
    async fn test_in_place_write_is_create_only() {
        let temp_dir = tempdir().unwrap();
        let storage = storage_in(&temp_dir);
        let checksum = Checksum::calculate(b"in place").unwrap();
        let path = storage.path_for(&checksum);

        storage.write_in_place(&path, b"in place").await.unwrap();
        storage.write_in_place(&path, b"imposter").await.unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"in place");
        assert_eq!(dir_entries(storage.root()).len(), 1);

        let result = storage.try_get(&checksum).await.unwrap();
        assert_eq!(result, StorageResult::Found(b"in place".to_vec()));
    }

    #[tokio::test]
    async fn test_unverified_read_returns_raw_bytes() {
        let temp_dir = tempdir().unwrap();
        let storage = storage_in(&temp_dir);
        let checksum = Checksum::calculate(b"genuine").unwrap();

        fs::write(storage.path_for(&checksum), b"tampered").unwrap();

        let bytes = storage.try_get(&checksum).await.unwrap().into_bytes().unwrap();
        assert_eq!(bytes, b"tampered");
    }
}
