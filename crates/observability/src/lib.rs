//! Tracing/logging setup shared by binaries and tests.

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use crate::tracing::{LogConfig, LogInitError, init, init_with};
