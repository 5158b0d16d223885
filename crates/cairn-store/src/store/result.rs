//! Store lookup result

use cairn_core::{CoreResult, StoreError};
use std::fmt;

use super::Persisted;
use crate::codec::{Codec, JsonCodec};

/// Outcome of a typed store lookup
pub enum StoreResult<T, C: Codec = JsonCodec> {
    /// A materialized value
    Found(Persisted<T, C>),
    /// Nothing stored under the checksum
    NotFound,
}

impl<T, C: Codec> StoreResult<T, C> {
    /// Check if a value was found
    pub fn contains(&self) -> bool {
        matches!(self, StoreResult::Found(_))
    }

    /// Borrow the persisted value
    pub fn persisted(&self) -> CoreResult<&Persisted<T, C>> {
        match self {
            StoreResult::Found(persisted) => Ok(persisted),
            StoreResult::NotFound => Err(StoreError::does_not_contain(None)),
        }
    }

    /// Take the persisted value
    pub fn into_persisted(self) -> CoreResult<Persisted<T, C>> {
        match self {
            StoreResult::Found(persisted) => Ok(persisted),
            StoreResult::NotFound => Err(StoreError::does_not_contain(None)),
        }
    }

    /// Borrow the plain value
    pub fn value(&self) -> CoreResult<&T> {
        self.persisted().map(Persisted::value)
    }
}

impl<T, C: Codec> From<Persisted<T, C>> for StoreResult<T, C> {
    fn from(persisted: Persisted<T, C>) -> Self {
        StoreResult::Found(persisted)
    }
}

impl<T, C: Codec> Clone for StoreResult<T, C> {
    fn clone(&self) -> Self {
        match self {
            StoreResult::Found(persisted) => StoreResult::Found(persisted.clone()),
            StoreResult::NotFound => StoreResult::NotFound,
        }
    }
}

impl<T: fmt::Debug, C: Codec> fmt::Debug for StoreResult<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreResult::Found(persisted) => f.debug_tuple("Found").field(persisted).finish(),
            StoreResult::NotFound => f.write_str("NotFound"),
        }
    }
}
