//! Materialized result cache
//!
//! Maps (result type, checksum) to the one registered [`Persisted`] for it.
//! Registration is insert-if-absent: when two callers race to register the
//! same key, the entry that landed first is handed back to both, and callers
//! must use the returned value rather than their own.

use cairn_core::{Checksum, CoreResult, StoreError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::codec::Codec;
use crate::store::{Persisted, StoreResult};

type CacheKey = (TypeId, Checksum);

/// Bounds on what the cache retains
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Maximum number of entries; `None` is unbounded, `Some(0)` disables caching
    pub max_entries: Option<usize>,
    /// Age after which an entry is no longer served
    pub ttl: Option<Duration>,
}

impl CachePolicy {
    /// Never evict
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Cache nothing
    pub fn disabled() -> Self {
        Self {
            max_entries: Some(0),
            ttl: None,
        }
    }

    /// Keep at most `max_entries`, evicting the oldest first
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries),
            ttl: None,
        }
    }

    /// Expire entries after `ttl`
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Check if the policy caches nothing
    pub fn is_disabled(&self) -> bool {
        self.max_entries == Some(0)
    }
}

struct CacheSlot {
    result: Arc<dyn Any + Send + Sync>,
    inserted_at: Instant,
}

impl CacheSlot {
    fn new<T, C>(persisted: Persisted<T, C>) -> Self
    where
        T: Send + Sync + 'static,
        C: Codec,
    {
        Self {
            result: Arc::new(persisted),
            inserted_at: Instant::now(),
        }
    }

    fn downcast<T, C>(&self) -> Option<Persisted<T, C>>
    where
        T: Send + Sync + 'static,
        C: Codec,
    {
        self.result.downcast_ref::<Persisted<T, C>>().cloned()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently held
    pub entries: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Entries dropped for capacity or age
    pub evictions: u64,
}

/// Cache of materialized store results
pub struct StoreResultCache {
    entries: DashMap<CacheKey, CacheSlot>,
    policy: CachePolicy,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl StoreResultCache {
    /// Create an unbounded cache
    pub fn new() -> Self {
        Self::with_policy(CachePolicy::unbounded())
    }

    /// Create a cache with explicit bounds
    pub fn with_policy(policy: CachePolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Get the retention policy
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Register a found result, or get the one already registered for its key
    ///
    /// Fails with `InvalidArgument` for `NotFound`: absence is never cached, so
    /// a later write or read of the same checksum is always observable.
    pub fn add_or_get<T, C>(&self, result: StoreResult<T, C>) -> CoreResult<StoreResult<T, C>>
    where
        T: Send + Sync + 'static,
        C: Codec,
    {
        let persisted = match result {
            StoreResult::Found(persisted) => persisted,
            StoreResult::NotFound => {
                return Err(StoreError::invalid_argument("result", "Contains was false"))
            }
        };

        if self.policy.is_disabled() {
            return Ok(StoreResult::Found(persisted));
        }

        let key = Self::key::<T, C>(persisted.checksum());
        let mut inserted = false;
        let winner = match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                let current = if self.is_expired(occupied.get()) {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    None
                } else {
                    occupied.get().downcast::<T, C>()
                };
                match current {
                    Some(existing) => existing,
                    None => {
                        occupied.insert(CacheSlot::new(persisted.clone()));
                        persisted
                    }
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheSlot::new(persisted.clone()));
                inserted = true;
                persisted
            }
        };

        if inserted {
            self.enforce_capacity();
        }

        Ok(StoreResult::Found(winner))
    }

    /// Look up the registered result for `checksum`
    pub fn try_get<T, C>(&self, checksum: &Checksum) -> StoreResult<T, C>
    where
        T: Send + Sync + 'static,
        C: Codec,
    {
        if self.policy.is_disabled() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return StoreResult::NotFound;
        }

        let key = Self::key::<T, C>(checksum);
        let mut expired = false;
        let found = match self.entries.get(&key) {
            Some(slot) if self.is_expired(slot.value()) => {
                expired = true;
                None
            }
            Some(slot) => slot.value().downcast::<T, C>(),
            None => None,
        };

        if expired && self.entries.remove_if(&key, |_, slot| self.is_expired(slot)).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        match found {
            Some(persisted) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                StoreResult::Found(persisted)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                StoreResult::NotFound
            }
        }
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn key<T: 'static, C: Codec>(checksum: &Checksum) -> CacheKey {
        (TypeId::of::<Persisted<T, C>>(), checksum.clone())
    }

    fn is_expired(&self, slot: &CacheSlot) -> bool {
        match self.policy.ttl {
            Some(ttl) => slot.inserted_at.elapsed() >= ttl,
            None => false,
        }
    }

    fn enforce_capacity(&self) {
        let Some(max_entries) = self.policy.max_entries else {
            return;
        };
        if self.entries.len() <= max_entries {
            return;
        }

        if self.policy.ttl.is_some() {
            let before = self.entries.len();
            self.entries.retain(|_, slot| !self.is_expired(slot));
            let dropped = before.saturating_sub(self.entries.len());
            self.evictions.fetch_add(dropped as u64, Ordering::Relaxed);
        }

        while self.entries.len() > max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().inserted_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    if self.entries.remove(&key).is_some() {
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                    }
                }
                None => break,
            }
        }
    }
}

impl Default for StoreResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StoreResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreResultCache")
            .field("entries", &self.entries.len())
            .field("policy", &self.policy)
            .finish()
    }
}
