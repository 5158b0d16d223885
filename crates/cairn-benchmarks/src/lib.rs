//! Cairn benchmarking suite
//!
//! Benchmarks for checksum interning and store persist/get paths.

pub mod common;

pub use common::*;
