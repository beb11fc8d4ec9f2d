use serde::{Deserialize, Serialize};

/// Where out-of-stock notifications go unless configured otherwise.
pub const DEFAULT_STOCK_EMAIL: &str = "stock@made.com";

pub const DEFAULT_LOG_FILTER: &str = "info";

/// Runtime configuration of the allocation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Recipient of "out of stock" notifications.
    pub out_of_stock_destination: String,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            out_of_stock_destination: DEFAULT_STOCK_EMAIL.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AllocationConfig {
    /// Read `ALLOCATION_STOCK_EMAIL` / `ALLOCATION_LOG_FILTER`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source (process env, a parsed file, a test map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let setting = |key: &str, default: &str| {
            match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
                Some(value) => value,
                None => {
                    tracing::warn!(key, default, "setting not provided; using default");
                    default.to_string()
                }
            }
        };

        Self {
            out_of_stock_destination: setting("ALLOCATION_STOCK_EMAIL", DEFAULT_STOCK_EMAIL),
            log_filter: setting("ALLOCATION_LOG_FILTER", DEFAULT_LOG_FILTER),
        }
    }
}
