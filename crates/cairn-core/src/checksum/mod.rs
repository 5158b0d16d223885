//! Checksum identity for stored values
//!
//! A `Checksum` is the SHA-512 digest of a value's serialized bytes. Every
//! `Checksum` is obtained through a [`ChecksumInterner`], so two checksums with
//! equal bytes taken from the same registry are the same allocation.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{CoreResult, StoreError};

pub mod intern;

pub use intern::ChecksumInterner;

/// Length of a SHA-512 digest in bytes
pub const CHECKSUM_LEN: usize = 64;

/// Interned SHA-512 digest identifying a stored value
#[derive(Clone)]
pub struct Checksum {
    inner: Arc<ChecksumInner>,
}

struct ChecksumInner {
    bytes: [u8; CHECKSUM_LEN],
    /// Canonical text form, computed once
    base64: String,
}

impl Checksum {
    /// Only the interner creates checksums.
    pub(crate) fn from_digest(bytes: [u8; CHECKSUM_LEN]) -> Self {
        let base64 = STANDARD.encode(bytes);
        Self {
            inner: Arc::new(ChecksumInner { bytes, base64 }),
        }
    }

    /// Get the interned checksum for a 64 byte digest from the global registry
    pub fn get(bytes: &[u8]) -> CoreResult<Self> {
        ChecksumInterner::global().get(bytes)
    }

    /// Get the interned checksum for its canonical base64 text
    pub fn from_base64(text: &str) -> CoreResult<Self> {
        ChecksumInterner::global().from_base64(text)
    }

    /// Digest `bytes` with SHA-512 and return the interned checksum
    pub fn calculate(bytes: &[u8]) -> CoreResult<Self> {
        ChecksumInterner::global().calculate(bytes)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; CHECKSUM_LEN] {
        &self.inner.bytes
    }

    /// Copy of the raw digest bytes
    pub fn to_vec(&self) -> Vec<u8> {
        self.inner.bytes.to_vec()
    }

    /// Canonical text encoding
    pub fn to_base64(&self) -> &str {
        &self.inner.base64
    }

    /// Unpadded RFC 4648 base32, safe for file names on case-insensitive filesystems
    pub fn to_base32(&self) -> String {
        data_encoding::BASE32_NOPAD.encode(&self.inner.bytes)
    }

    /// True when both handles point at the same interned instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Checksum {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.inner.bytes == other.inner.bytes
    }
}

impl Eq for Checksum {}

impl Hash for Checksum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.bytes.hash(state);
    }
}

// Ordered by canonical text, not by raw bytes.
impl Ord for Checksum {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.base64.cmp(&other.inner.base64)
    }
}

impl PartialOrd for Checksum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.base64)
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Checksum").field(&self.inner.base64).finish()
    }
}

impl FromStr for Checksum {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base64(s)
    }
}

impl Serialize for Checksum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Checksum::from_base64(&text).map_err(de::Error::custom)
    }
}
