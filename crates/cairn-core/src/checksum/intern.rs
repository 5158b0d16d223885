//! Checksum interning
//!
//! The registry maps digest bytes to the one live [`Checksum`] for them.
//! Lookups never block on unrelated digests: `DashMap` shards the table, and a
//! first-time insert goes through the entry API so concurrent creators of the
//! same digest all converge on whichever instance landed first.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha512};
use tracing::trace;

use super::{Checksum, CHECKSUM_LEN};
use crate::error::{CoreResult, StoreError};

static GLOBAL: Lazy<ChecksumInterner> = Lazy::new(ChecksumInterner::new);

/// Registry holding one live [`Checksum`] per digest
#[derive(Debug, Default)]
pub struct ChecksumInterner {
    entries: DashMap<[u8; CHECKSUM_LEN], Checksum>,
}

impl ChecksumInterner {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// The process-wide registry
    pub fn global() -> &'static ChecksumInterner {
        &GLOBAL
    }

    /// Get the interned checksum for a 64 byte digest
    pub fn get(&self, bytes: &[u8]) -> CoreResult<Checksum> {
        let digest: [u8; CHECKSUM_LEN] = bytes.try_into().map_err(|_| {
            StoreError::invalid_argument(
                "bytes",
                format!("Length must be {}, got {}", CHECKSUM_LEN, bytes.len()),
            )
        })?;
        Ok(self.intern(digest))
    }

    /// Get the interned checksum for its canonical base64 text
    pub fn from_base64(&self, text: &str) -> CoreResult<Checksum> {
        let bytes = STANDARD
            .decode(text)
            .map_err(|e| StoreError::invalid_argument("base64", format!("Invalid base64: {}", e)))?;
        self.get(&bytes)
    }

    /// Digest `bytes` with SHA-512 and return the interned checksum
    pub fn calculate(&self, bytes: &[u8]) -> CoreResult<Checksum> {
        if bytes.is_empty() {
            return Err(StoreError::invalid_argument(
                "bytes",
                "Length of byte array was zero",
            ));
        }
        let mut digest = [0u8; CHECKSUM_LEN];
        digest.copy_from_slice(&Sha512::digest(bytes));
        Ok(self.intern(digest))
    }

    /// Check if a digest is interned, without interning it
    pub fn contains(&self, bytes: &[u8]) -> bool {
        match <[u8; CHECKSUM_LEN]>::try_from(bytes) {
            Ok(digest) => self.entries.contains_key(&digest),
            Err(_) => false,
        }
    }

    /// Number of interned checksums
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn intern(&self, digest: [u8; CHECKSUM_LEN]) -> Checksum {
        if let Some(existing) = self.entries.get(&digest) {
            return existing.value().clone();
        }

        // Losing candidates of a race are dropped here.
        let candidate = Checksum::from_digest(digest);
        let winner = self.entries.entry(digest).or_insert(candidate).value().clone();
        trace!(checksum = %winner, "interned checksum");
        winner
    }
}
