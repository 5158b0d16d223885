//! # cairn-core
//!
//! Core types shared across all Cairn crates.
//!
//! This crate provides:
//! - `Checksum`, the interned SHA-512 identity of a stored value
//! - `ChecksumInterner`, the registry that keeps one live `Checksum` per digest
//! - `StoreError` for unified error handling
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `checksum`: digest identity, text encodings and interning
//! - `error`: Error types and result aliases

pub mod checksum;
pub mod error;

// Re-export commonly used types
pub use checksum::{Checksum, ChecksumInterner, CHECKSUM_LEN};
pub use error::{CoreResult, StoreError};
