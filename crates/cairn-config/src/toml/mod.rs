//! Store configuration parsing and serialization

use camino::{Utf8Path, Utf8PathBuf};
use cairn_core::error::StoreError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigResult;

/// Complete store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backends in read order; writes fan out to all of them
    pub backends: Vec<BackendSpec>,

    /// Result cache settings
    #[serde(default)]
    pub cache: CacheSection,

    /// Read behavior
    #[serde(default)]
    pub read: ReadSection,
}

/// A single storage backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BackendSpec {
    /// One file per checksum directly under `root`
    File {
        /// Directory holding the content files
        root: Utf8PathBuf,

        /// Re-hash content on every read
        #[serde(default, rename = "verify-reads")]
        verify_reads: bool,
    },

    /// Process-local memory, gone on exit
    Memory,
}

/// Result cache section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheSection {
    /// Maximum number of cached results; absent means unbounded, 0 disables the cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,

    /// Seconds a cached result stays valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

/// Read section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReadSection {
    /// What a failing backend means during a read
    #[serde(default)]
    pub on_backend_error: ReadFailureMode,
}

/// Treatment of a backend that fails to answer a read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadFailureMode {
    /// Log the failure and try the next backend
    #[default]
    TreatAsMissing,
    /// Fail the read with the backend's error
    Propagate,
}

impl CacheSection {
    /// Cache time-to-live as a Duration
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

impl std::str::FromStr for ReadFailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "treat-as-missing" => Ok(ReadFailureMode::TreatAsMissing),
            "propagate" => Ok(ReadFailureMode::Propagate),
            other => Err(format!(
                "expected 'treat-as-missing' or 'propagate', got '{}'",
                other
            )),
        }
    }
}

/// Parse TOML string to StoreConfig
pub fn parse_store_config(content: &str) -> ConfigResult<StoreConfig> {
    let config: StoreConfig = toml::from_str(content).map_err(|e| StoreError::ConfigParse {
        message: e.to_string(),
    })?;

    validate_config(&config)?;

    Ok(config)
}

/// Serialize StoreConfig to TOML string
pub fn serialize_store_config(config: &StoreConfig) -> ConfigResult<String> {
    toml::to_string_pretty(config).map_err(|e| StoreError::ConfigParse {
        message: format!("TOML serialization error: {}", e),
    })
}

/// Validate configuration completeness
pub fn validate_config(config: &StoreConfig) -> ConfigResult<()> {
    if config.backends.is_empty() {
        return Err(StoreError::Config {
            field: "backends".to_string(),
            reason: "At least one backend is required".to_string(),
        });
    }

    for (index, backend) in config.backends.iter().enumerate() {
        if let BackendSpec::File { root, .. } = backend {
            if root.as_str().trim().is_empty() {
                return Err(StoreError::Config {
                    field: format!("backends[{}].root", index),
                    reason: "File backend root must not be empty".to_string(),
                });
            }
        }
    }

    if config.cache.ttl_secs == Some(0) {
        return Err(StoreError::Config {
            field: "cache.ttl-secs".to_string(),
            reason: "ttl must be greater than zero".to_string(),
        });
    }

    Ok(())
}

/// Load and parse a store configuration from file path
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<StoreConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StoreError::io(format!("Failed to read {}", path), e))?;

    parse_store_config(&content).map_err(|e| match e {
        StoreError::ConfigParse { message } => StoreError::ConfigParse {
            message: format!("In file {}: {}", path, message),
        },
        StoreError::Config { field, reason } => StoreError::Config {
            field,
            reason: format!("In file {}: {}", path, reason),
        },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[[backends]]
kind = "memory"
"#;

        let config = parse_store_config(toml).unwrap();
        assert_eq!(config.backends, vec![BackendSpec::Memory]);
        assert_eq!(config.cache, CacheSection::default());
        assert_eq!(config.read.on_backend_error, ReadFailureMode::TreatAsMissing);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[[backends]]
kind = "file"
root = "/var/lib/cairn"
verify-reads = true

[[backends]]
kind = "memory"

[cache]
max-entries = 10000
ttl-secs = 3600

[read]
on-backend-error = "propagate"
"#;

        let config = parse_store_config(toml).unwrap();
        assert_eq!(config.backends.len(), 2);
        assert_eq!(
            config.backends[0],
            BackendSpec::File {
                root: Utf8PathBuf::from("/var/lib/cairn"),
                verify_reads: true,
            }
        );
        assert_eq!(config.cache.max_entries, Some(10000));
        assert_eq!(config.cache.ttl(), Some(Duration::from_secs(3600)));
        assert_eq!(config.read.on_backend_error, ReadFailureMode::Propagate);
    }

    #[test]
    fn test_empty_backends_rejected() {
        let toml = "backends = []\n";
        let err = parse_store_config(toml).unwrap_err();
        assert!(matches!(err, StoreError::Config { ref field, .. } if field == "backends"));
    }

    #[test]
    fn test_missing_backends_is_parse_error() {
        let err = parse_store_config("[cache]\nmax-entries = 1\n").unwrap_err();
        assert!(matches!(err, StoreError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_backend_kind() {
        let toml = r#"
[[backends]]
kind = "s3"
"#;
        assert!(parse_store_config(toml).is_err());
    }

    #[test]
    fn test_empty_file_root_rejected() {
        let toml = r#"
[[backends]]
kind = "file"
root = ""
"#;
        let err = parse_store_config(toml).unwrap_err();
        assert!(matches!(err, StoreError::Config { ref field, .. } if field == "backends[0].root"));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let toml = r#"
[[backends]]
kind = "memory"

[cache]
ttl-secs = 0
"#;
        assert!(parse_store_config(toml).is_err());
    }

    #[test]
    fn test_round_trip_serialization() {
        let toml = r#"
[[backends]]
kind = "file"
root = "data"

[cache]
max-entries = 16
"#;

        let config = parse_store_config(toml).unwrap();
        let serialized = serialize_store_config(&config).unwrap();
        let reparsed = parse_store_config(&serialized).unwrap();

        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_read_failure_mode_from_str() {
        assert_eq!(
            "propagate".parse::<ReadFailureMode>(),
            Ok(ReadFailureMode::Propagate)
        );
        assert_eq!(
            "treat-as-missing".parse::<ReadFailureMode>(),
            Ok(ReadFailureMode::TreatAsMissing)
        );
        assert!("ignore".parse::<ReadFailureMode>().is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp_dir.path().join("cairn.toml")).unwrap();
        tokio::fs::write(&path, "[[backends]]\nkind = \"memory\"\n")
            .await
            .unwrap();

        let config = load_from_file(&path).await.unwrap();
        assert_eq!(config.backends, vec![BackendSpec::Memory]);
    }

    #[tokio::test]
    async fn test_load_from_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp_dir.path().join("absent.toml")).unwrap();

        let err = load_from_file(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
