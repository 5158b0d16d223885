//! Configuration parsing for Cairn stores
//!
//! This crate handles parsing and validation of the TOML file describing a
//! store: which backends it fans out to, how large the result cache may grow,
//! and how backend read failures are treated. Environment variables may
//! override the tunables after the file is loaded.

pub mod env;
pub mod toml;

// Re-export main types
pub use crate::env::{apply_env_overrides, EnvOverrides};
pub use crate::toml::{
    load_from_file, parse_store_config, serialize_store_config, validate_config, BackendSpec,
    CacheSection, ReadFailureMode, ReadSection, StoreConfig,
};

use cairn_core::error::StoreError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, StoreError>;
