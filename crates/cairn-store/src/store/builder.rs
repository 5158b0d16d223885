//! Store construction

use cairn_config::{BackendSpec, ReadFailureMode, StoreConfig};
use cairn_core::{ChecksumInterner, CoreResult, StoreError};
use dashmap::DashMap;
use std::sync::Arc;

use super::{Store, StoreInner};
use crate::cache::{CachePolicy, StoreResultCache};
use crate::codec::{Codec, JsonCodec};
use crate::storage::{FileStorage, MemoryStorage, Storage};
use crate::validate::Validator;

/// Builder for [`Store`]
pub struct StoreBuilder<C: Codec = JsonCodec> {
    backends: Vec<Arc<dyn Storage>>,
    codec: C,
    cache: Option<Arc<StoreResultCache>>,
    validators: Vec<Arc<dyn Validator>>,
    interner: Option<Arc<ChecksumInterner>>,
    read_policy: ReadFailureMode,
}

impl StoreBuilder<JsonCodec> {
    /// Start with no backends, the JSON codec and a fresh unbounded cache
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            codec: JsonCodec,
            cache: None,
            validators: Vec::new(),
            interner: None,
            read_policy: ReadFailureMode::default(),
        }
    }
}

impl Default for StoreBuilder<JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> StoreBuilder<C> {
    /// Append a backend; backends are read in the order they are added
    pub fn backend(mut self, backend: Arc<dyn Storage>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Append several backends
    pub fn backends<I>(mut self, backends: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Storage>>,
    {
        self.backends.extend(backends);
        self
    }

    /// Replace the codec
    pub fn codec<D: Codec>(self, codec: D) -> StoreBuilder<D> {
        StoreBuilder {
            backends: self.backends,
            codec,
            cache: self.cache,
            validators: self.validators,
            interner: self.interner,
            read_policy: self.read_policy,
        }
    }

    /// Use a shared result cache
    pub fn cache(mut self, cache: Arc<StoreResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run `validator` on every value before it is persisted
    pub fn validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Intern checksums in `interner` instead of the process-wide registry
    pub fn interner(mut self, interner: Arc<ChecksumInterner>) -> Self {
        self.interner = Some(interner);
        self
    }

    /// Set how a failing backend is treated during reads
    pub fn read_failure_policy(mut self, policy: ReadFailureMode) -> Self {
        self.read_policy = policy;
        self
    }

    /// Build the store
    pub fn build(self) -> CoreResult<Store<C>> {
        if self.backends.is_empty() {
            return Err(StoreError::invalid_argument(
                "backends",
                "Did not contain any values",
            ));
        }

        Ok(Store::from_inner(Arc::new(StoreInner {
            backends: self.backends,
            codec: self.codec,
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(StoreResultCache::new())),
            validators: self.validators,
            interner: self.interner,
            read_policy: self.read_policy,
            in_flight: DashMap::new(),
        })))
    }
}

impl Store<JsonCodec> {
    /// Build a JSON store from a loaded configuration
    pub fn from_config(config: &StoreConfig) -> CoreResult<Self> {
        cairn_config::validate_config(config)?;

        let mut builder = StoreBuilder::new().read_failure_policy(config.read.on_backend_error);

        for spec in &config.backends {
            let backend: Arc<dyn Storage> = match spec {
                BackendSpec::File { root, verify_reads } => {
                    Arc::new(FileStorage::new(root)?.with_verification(*verify_reads))
                }
                BackendSpec::Memory => Arc::new(MemoryStorage::new()),
            };
            builder = builder.backend(backend);
        }

        let policy = CachePolicy {
            max_entries: config.cache.max_entries,
            ttl: config.cache.ttl(),
        };

        builder
            .cache(Arc::new(StoreResultCache::with_policy(policy)))
            .build()
    }
}
