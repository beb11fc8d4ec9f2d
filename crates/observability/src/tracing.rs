//! Tracing/logging initialization.
//!
//! JSON logs with timestamps. `RUST_LOG` wins; otherwise the caller's default
//! filter (the service's configured `log_filter`) applies.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("invalid log filter `{filter}`: {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Initialize tracing with the `info` default.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_default("info");
}

/// Initialize tracing, falling back to `default_filter` when `RUST_LOG` is unset.
///
/// Safe to call multiple times (subsequent calls are no-ops). An unparsable
/// filter degrades to `info`.
pub fn init_with_default(default_filter: &str) {
    if let Err(ObservabilityError::InvalidFilter { .. }) = try_init(default_filter) {
        let _ = install(EnvFilter::new("info"));
    }
}

/// Like [`init_with_default`], but reports what went wrong.
pub fn try_init(default_filter: &str) -> Result<(), ObservabilityError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(default_filter)?,
    };
    install(filter)
}

fn build_filter(directives: &str) -> Result<EnvFilter, ObservabilityError> {
    EnvFilter::try_new(directives).map_err(|err| ObservabilityError::InvalidFilter {
        filter: directives.to_string(),
        reason: err.to_string(),
    })
}

fn install(filter: EnvFilter) -> Result<(), ObservabilityError> {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init()
        .map_err(|_| ObservabilityError::AlreadyInitialized)
}
