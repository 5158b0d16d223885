//! Store orchestration
//!
//! A [`Store`] ties a codec, an ordered list of backends and a result cache
//! together:
//!
//! - `persist`: validate, serialize, checksum, then fan the bytes out to every
//!   backend concurrently. The result is registered with the cache only after
//!   all backends have finished.
//! - `get`: ask the cache, then the backends in configured order; the first
//!   backend that has the content wins.

use cairn_config::ReadFailureMode;
use cairn_core::{Checksum, ChecksumInterner, CoreResult, StoreError};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::cache::StoreResultCache;
use crate::codec::{Codec, JsonCodec};
use crate::storage::{Storage, StorageResult};
use crate::validate::Validator;

pub mod builder;
pub mod persisted;
pub mod result;

// Re-export main types
pub use builder::StoreBuilder;
pub use persisted::Persisted;
pub use result::StoreResult;

/// Content-addressed store for immutable values
///
/// Cloning is cheap; clones share backends, cache and in-flight writes.
pub struct Store<C: Codec = JsonCodec> {
    inner: Arc<StoreInner<C>>,
}

pub(crate) struct StoreInner<C: Codec> {
    /// Read order is list order
    backends: Vec<Arc<dyn Storage>>,
    codec: C,
    cache: Arc<StoreResultCache>,
    validators: Vec<Arc<dyn Validator>>,
    /// `None` uses the process-wide registry
    interner: Option<Arc<ChecksumInterner>>,
    read_policy: ReadFailureMode,
    /// One cell per checksum currently being fanned out
    in_flight: DashMap<Checksum, Arc<OnceCell<()>>>,
}

impl Store<JsonCodec> {
    /// Create a JSON store over a single backend
    pub fn new(backend: Arc<dyn Storage>) -> Self {
        Self::from_inner(Arc::new(StoreInner {
            backends: vec![backend],
            codec: JsonCodec,
            cache: Arc::new(StoreResultCache::new()),
            validators: Vec::new(),
            interner: None,
            read_policy: ReadFailureMode::default(),
            in_flight: DashMap::new(),
        }))
    }

    /// Create a JSON store over an ordered, non-empty list of backends
    pub fn with_backends(backends: Vec<Arc<dyn Storage>>) -> CoreResult<Self> {
        StoreBuilder::new().backends(backends).build()
    }

    /// Start configuring a store
    pub fn builder() -> StoreBuilder<JsonCodec> {
        StoreBuilder::new()
    }
}

impl<C: Codec> Store<C> {
    pub(crate) fn from_inner(inner: Arc<StoreInner<C>>) -> Self {
        Self { inner }
    }

    /// Serialize `value`, write it to every backend and return the canonical
    /// persisted handle for it
    pub async fn persist<T>(&self, value: T) -> CoreResult<Persisted<T, C>>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        for validator in &self.inner.validators {
            validator.validate(&value, type_name)?;
        }

        let bytes = self.inner.codec.encode(&value)?;
        let checksum = self.interner().calculate(&bytes)?;

        if let StoreResult::Found(cached) = self.inner.cache.try_get::<T, C>(&checksum) {
            debug!(%checksum, type_name, "persist answered from cache");
            return Ok(cached);
        }

        let flight = self.join_flight(&checksum);

        // A writer that finished since the first lookup registered before leaving
        if let StoreResult::Found(cached) = self.inner.cache.try_get::<T, C>(&checksum) {
            debug!(%checksum, type_name, "persist answered by concurrent writer");
            return Ok(cached);
        }

        flight
            .cell
            .get_or_try_init(|| self.fan_out(&checksum, &bytes))
            .await?;

        let persisted = Persisted::new(value, checksum, Arc::downgrade(&self.inner));
        let registered = self.inner.cache.add_or_get(StoreResult::Found(persisted))?;
        drop(flight);

        registered.into_persisted()
    }

    /// Get the value stored under `checksum`, failing with
    /// `DoesNotContainValue` when no backend has it
    pub async fn get<T>(&self, checksum: &Checksum) -> CoreResult<Persisted<T, C>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        match self.try_get(checksum).await? {
            StoreResult::Found(persisted) => Ok(persisted),
            StoreResult::NotFound => Err(StoreError::does_not_contain(Some(checksum.to_string()))),
        }
    }

    /// Get the value stored under `checksum`, reporting absence as `NotFound`
    pub async fn try_get<T>(&self, checksum: &Checksum) -> CoreResult<StoreResult<T, C>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        if let found @ StoreResult::Found(_) = self.inner.cache.try_get::<T, C>(checksum) {
            debug!(%checksum, "get answered from cache");
            return Ok(found);
        }

        for backend in &self.inner.backends {
            let bytes = match backend.try_get(checksum).await {
                Ok(StorageResult::Found(bytes)) => bytes,
                Ok(StorageResult::NotFound) => continue,
                Err(e) => match self.inner.read_policy {
                    ReadFailureMode::TreatAsMissing => {
                        warn!(backend = backend.name(), %checksum, error = %e, "backend read failed, trying next backend");
                        continue;
                    }
                    ReadFailureMode::Propagate => return Err(e),
                },
            };

            debug!(backend = backend.name(), %checksum, "get answered by backend");
            let value: T = self.inner.codec.decode(&bytes)?;
            let persisted = Persisted::new(value, checksum.clone(), Arc::downgrade(&self.inner));
            return self.inner.cache.add_or_get(StoreResult::Found(persisted));
        }

        Ok(StoreResult::NotFound)
    }

    /// Backends in read order
    pub fn backends(&self) -> &[Arc<dyn Storage>] {
        &self.inner.backends
    }

    /// The result cache
    pub fn cache(&self) -> &Arc<StoreResultCache> {
        &self.inner.cache
    }

    /// The codec
    pub fn codec(&self) -> &C {
        &self.inner.codec
    }

    /// True when both handles are the same store
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn interner(&self) -> &ChecksumInterner {
        match &self.inner.interner {
            Some(interner) => interner,
            None => ChecksumInterner::global(),
        }
    }

    /// Join the write in flight for `checksum`, starting one if there is none.
    fn join_flight(&self, checksum: &Checksum) -> InFlight<'_> {
        let cell = self
            .inner
            .in_flight
            .entry(checksum.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        InFlight {
            writes: &self.inner.in_flight,
            checksum: checksum.clone(),
            cell,
        }
    }

    /// Write to every backend and wait for all of them. The first failure in
    /// backend order is returned; later ones are logged.
    async fn fan_out(&self, checksum: &Checksum, bytes: &[u8]) -> CoreResult<()> {
        let writes = self
            .inner
            .backends
            .iter()
            .map(|backend| backend.ensure_persisted(checksum, bytes));
        let results = futures::future::join_all(writes).await;

        let mut first_error = None;
        for (backend, result) in self.inner.backends.iter().zip(results) {
            match result {
                Ok(()) => debug!(backend = backend.name(), %checksum, "backend write complete"),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => {
                    warn!(backend = backend.name(), %checksum, error = %e, "additional backend write failed")
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Membership in a checksum's shared write. The map entry is released on drop,
/// including when the persisting future is cancelled mid fan-out.
struct InFlight<'a> {
    writes: &'a DashMap<Checksum, Arc<OnceCell<()>>>,
    checksum: Checksum,
    cell: Arc<OnceCell<()>>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.writes
            .remove_if(&self.checksum, |_, current| Arc::ptr_eq(current, &self.cell));
    }
}

impl<C: Codec> Clone for Store<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Codec> fmt::Debug for Store<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backends: Vec<&str> = self.inner.backends.iter().map(|b| b.name()).collect();
        f.debug_struct("Store")
            .field("backends", &backends)
            .field("cache", &self.inner.cache)
            .field("validators", &self.inner.validators.len())
            .field("read_policy", &self.inner.read_policy)
            .finish()
    }
}
