//! Fixed-window rate limiting on top of the document store.
//!
//! Each client key gets one `{count, windowStart}` document. A request either
//! starts a new window (count 1) or bumps the count of the current one; once the
//! count would exceed the limit, requests are rejected until the window ends.
//!
//! Counter updates are a single compare-and-swap with no retry. When two
//! requests race, the loser is let through without being counted. Counts may
//! therefore be slightly off under contention, but a request never waits on
//! another one.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::{keys, DocumentStore};

/// Default window length (one minute).
pub const DEFAULT_WINDOW_MS: u64 = 60_000;

/// Default number of requests allowed per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 10;

/// HTTP status reported for a rejected request.
pub const TOO_MANY_REQUESTS_STATUS: u16 = 429;

/// Message reported for a rejected request.
pub const TOO_MANY_REQUESTS_MESSAGE: &str = "Too many requests. Please try again later.";

/// Rate limiter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Length of a counting window.
    pub window: Duration,
    /// Requests allowed per window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(DEFAULT_WINDOW_MS),
            max_requests: DEFAULT_MAX_REQUESTS,
        }
    }
}

/// Counter document stored per client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
    /// Requests counted in the current window.
    pub count: u32,
    /// Window start in epoch milliseconds.
    pub window_start: i64,
}

/// A rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Too many requests. Please try again later.")]
pub struct TooManyRequests {
    /// Time until the current window ends.
    pub retry_after: Duration,
}

impl TooManyRequests {
    /// HTTP-equivalent status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        TOO_MANY_REQUESTS_STATUS
    }

    /// Message to show the client.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        TOO_MANY_REQUESTS_MESSAGE
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The request may proceed; `count` is its position in the current window.
    Allowed {
        /// Requests counted in the window, including this one.
        count: u32,
    },
    /// The client exceeded its allowance.
    Rejected(TooManyRequests),
}

impl RateLimitDecision {
    /// Whether the request may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Convert a rejection into an error.
    ///
    /// # Errors
    ///
    /// Returns `TooManyRequests` if the request was rejected.
    pub fn into_result(self) -> std::result::Result<u32, TooManyRequests> {
        match self {
            Self::Allowed { count } => Ok(count),
            Self::Rejected(rejection) => Err(rejection),
        }
    }
}

/// Per-client request limiter.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn DocumentStore>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter using the system clock.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: RateLimitConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create a limiter with an explicit time source.
    #[must_use]
    pub fn with_clock(
        store: Arc<dyn DocumentStore>,
        config: RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// The limiter's settings.
    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count a request from `client` and decide whether it may proceed.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store is unavailable.
    pub async fn check(&self, client: &str) -> Result<RateLimitDecision> {
        let key = keys::rate_limit_key(client);
        let now = self.clock.now_millis();
        let window_ms = i64::try_from(self.config.window.as_millis()).unwrap_or(i64::MAX);

        let stored = self.store.get(&key).await?;
        let expected_version = stored.as_ref().map_or(0, |doc| doc.version);

        let current = stored.and_then(|doc| {
            serde_json::from_value::<RateLimitRecord>(doc.value)
                .map_err(|e| {
                    tracing::warn!(key = %key, error = %e, "Discarding unreadable rate-limit record");
                })
                .ok()
        });

        let next = match current {
            Some(record) if now.saturating_sub(record.window_start) < window_ms => RateLimitRecord {
                count: record.count.saturating_add(1),
                window_start: record.window_start,
            },
            _ => RateLimitRecord {
                count: 1,
                window_start: now,
            },
        };

        if next.count > self.config.max_requests {
            let elapsed = now.saturating_sub(next.window_start);
            let remaining = u64::try_from(window_ms.saturating_sub(elapsed)).unwrap_or(0);
            tracing::warn!(client = %client, count = next.count, "Rate limit exceeded");
            return Ok(RateLimitDecision::Rejected(TooManyRequests {
                retry_after: Duration::from_millis(remaining),
            }));
        }

        let value = serde_json::to_value(next)?;
        if !self
            .store
            .compare_and_swap(&key, expected_version, value)
            .await?
        {
            tracing::debug!(client = %client, "Rate-limit counter update lost race, allowing request");
        }

        Ok(RateLimitDecision::Allowed { count: next.count })
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
