//! Tracing/logging setup shared by every binary and test harness.

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use self::tracing::{ObservabilityError, init, init_with_default, try_init};
