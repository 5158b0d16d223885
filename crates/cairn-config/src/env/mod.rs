//! Environment overrides for store tunables

use cairn_core::error::StoreError;

use crate::toml::{ReadFailureMode, StoreConfig};
use crate::ConfigResult;

/// Overrides `cache.max-entries`
pub const CACHE_MAX_ENTRIES_VAR: &str = "CAIRN_CACHE_MAX_ENTRIES";
/// Overrides `cache.ttl-secs`
pub const CACHE_TTL_SECS_VAR: &str = "CAIRN_CACHE_TTL_SECS";
/// Overrides `read.on-backend-error`
pub const READ_ON_BACKEND_ERROR_VAR: &str = "CAIRN_READ_ON_BACKEND_ERROR";

/// Tunables taken from the environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub cache_max_entries: Option<usize>,
    pub cache_ttl_secs: Option<u64>,
    pub on_backend_error: Option<ReadFailureMode>,
}

impl EnvOverrides {
    /// Read overrides from the process environment
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Read overrides from an explicit set of variables
    pub fn from_vars<I, K, V>(vars: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut overrides = Self::default();

        for (key, value) in vars {
            let value = value.as_ref().trim();
            match key.as_ref() {
                CACHE_MAX_ENTRIES_VAR => {
                    overrides.cache_max_entries = Some(parse_var(CACHE_MAX_ENTRIES_VAR, value)?);
                }
                CACHE_TTL_SECS_VAR => {
                    overrides.cache_ttl_secs = Some(parse_var(CACHE_TTL_SECS_VAR, value)?);
                }
                READ_ON_BACKEND_ERROR_VAR => {
                    overrides.on_backend_error = Some(parse_var(READ_ON_BACKEND_ERROR_VAR, value)?);
                }
                _ => {}
            }
        }

        Ok(overrides)
    }

    /// Apply the overrides on top of a loaded configuration
    pub fn apply(&self, config: &mut StoreConfig) -> ConfigResult<()> {
        if let Some(max_entries) = self.cache_max_entries {
            config.cache.max_entries = Some(max_entries);
        }
        if let Some(ttl_secs) = self.cache_ttl_secs {
            config.cache.ttl_secs = Some(ttl_secs);
        }
        if let Some(mode) = self.on_backend_error {
            config.read.on_backend_error = mode;
        }
        crate::toml::validate_config(config)
    }
}

/// Apply the process environment's overrides to `config`
pub fn apply_env_overrides(config: &mut StoreConfig) -> ConfigResult<()> {
    EnvOverrides::from_env()?.apply(config)
}

fn parse_var<T>(name: &str, value: &str) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| StoreError::Config {
        field: name.to_string(),
        reason: format!("Invalid value '{}': {}", value, e),
    })
}
