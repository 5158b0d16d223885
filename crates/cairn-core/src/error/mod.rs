//! Error types and result aliases for Cairn operations.
//!
//! Provides a unified error type covering argument validation, validator
//! rejection, absence, codec failure and backend I/O.

use thiserror::Error;

/// Unified error type for all Cairn operations
#[derive(Error, Debug)]
pub enum StoreError {
    // Argument errors
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    // Validator errors
    #[error("Value of type {type_name} is not immutable: {reason}")]
    NotImmutable { type_name: String, reason: String },

    #[error("Value of type {type_name} is not serializable: {reason}")]
    NotSerializable { type_name: String, reason: String },

    // Absence
    #[error("{}", match .checksum {
        Some(checksum) => format!("Does not contain value. Checksum: {checksum}"),
        None => "Does not contain value".to_string(),
    })]
    DoesNotContainValue { checksum: Option<String> },

    // Codec errors
    #[error("Codec error: {message}")]
    Codec {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Storage errors
    #[error("Content stored under {checksum} is corrupt: it hashes to {actual}")]
    Corrupt { checksum: String, actual: String },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    // Config errors
    #[error("Failed to parse store configuration: {message}")]
    ConfigParse { message: String },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    Config { field: String, reason: String },
}

/// Result type alias for Cairn operations
pub type CoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Create an invalid argument error
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an absence error, optionally naming the checksum that was missing
    pub fn does_not_contain(checksum: Option<String>) -> Self {
        Self::DoesNotContainValue { checksum }
    }

    /// Create a codec error from any error type
    pub fn codec<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Codec {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Check if this error may go away when the operation is retried
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreError::Io { .. })
    }

    /// Check if this error reports absence rather than failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::DoesNotContainValue { .. })
    }
}
