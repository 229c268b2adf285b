//! Service configuration.

use std::time::Duration;

use aetherlog_store::{RateLimitConfig, RetryPolicy, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS};

/// Default attempt budget for index and patch CAS loops.
const DEFAULT_INDEX_RETRY_MAX_ATTEMPTS: u32 = 64;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Path to the `RocksDB` data directory. Without one (or without the
    /// `rocksdb-backend` feature) documents are kept in memory.
    pub data_dir: Option<String>,

    /// Rate limiter window and allowance.
    pub rate_limit: RateLimitConfig,

    /// Retry budget for entity CAS loops.
    pub retry: RetryPolicy,

    /// Email that becomes admin when it signs up first (optional).
    pub bootstrap_admin_email: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let window_ms: u64 = parsed(&lookup, "RATE_LIMIT_WINDOW_MS").unwrap_or(DEFAULT_WINDOW_MS);
        let max_requests: u32 = parsed(&lookup, "RATE_LIMIT_MAX_REQUESTS").unwrap_or(DEFAULT_MAX_REQUESTS);
        let max_attempts: u32 =
            parsed(&lookup, "INDEX_RETRY_MAX_ATTEMPTS").unwrap_or(DEFAULT_INDEX_RETRY_MAX_ATTEMPTS);

        Self {
            data_dir: lookup("DATA_DIR").filter(|dir| !dir.trim().is_empty()),
            rate_limit: RateLimitConfig {
                window: Duration::from_millis(window_ms),
                max_requests,
            },
            retry: RetryPolicy::with_max_attempts(max_attempts),
            bootstrap_admin_email: lookup("BOOTSTRAP_ADMIN_EMAIL")
                .map(|email| email.trim().to_lowercase())
                .filter(|email| !email.is_empty()),
        }
    }
}

/// Parse a numeric setting, logging and ignoring values that do not parse.
fn parsed<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "Ignoring unparsable setting");
            None
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            rate_limit: RateLimitConfig::default(),
            retry: RetryPolicy::with_max_attempts(DEFAULT_INDEX_RETRY_MAX_ATTEMPTS),
            bootstrap_admin_email: None,
        }
    }
}
