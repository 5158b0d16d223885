//! Persisted value handle

use cairn_core::Checksum;
use std::fmt;
use std::sync::{Arc, Weak};

use super::{Store, StoreInner};
use crate::codec::{Codec, JsonCodec};

/// A value bound to the checksum it was stored under and the store that
/// produced it
///
/// Cloning is cheap and preserves identity: clones compare equal under
/// [`Persisted::ptr_eq`].
pub struct Persisted<T, C: Codec = JsonCodec> {
    inner: Arc<PersistedInner<T, C>>,
}

struct PersistedInner<T, C: Codec> {
    value: T,
    checksum: Checksum,
    // Weak so the store's own cache does not keep the store alive.
    store: Weak<StoreInner<C>>,
}

impl<T, C: Codec> Persisted<T, C> {
    pub(crate) fn new(value: T, checksum: Checksum, store: Weak<StoreInner<C>>) -> Self {
        Self {
            inner: Arc::new(PersistedInner {
                value,
                checksum,
                store,
            }),
        }
    }

    /// The stored value
    pub fn value(&self) -> &T {
        &self.inner.value
    }

    /// Checksum the value was stored under
    pub fn checksum(&self) -> &Checksum {
        &self.inner.checksum
    }

    /// The producing store, if it is still alive
    pub fn store(&self) -> Option<Store<C>> {
        self.inner.store.upgrade().map(Store::from_inner)
    }

    /// Check whether `store` produced this value
    pub fn from_store(&self, store: &Store<C>) -> bool {
        std::ptr::eq(self.inner.store.as_ptr(), Arc::as_ptr(&store.inner))
    }

    /// True when both handles are the same materialized result
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T, C: Codec> Clone for Persisted<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug, C: Codec> fmt::Debug for Persisted<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persisted")
            .field("value", &self.inner.value)
            .field("checksum", &self.inner.checksum)
            .finish()
    }
}
