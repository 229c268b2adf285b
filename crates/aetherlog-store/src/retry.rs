//! Retry policy for compare-and-swap loops.

use std::time::Duration;

/// Default number of attempts before a CAS loop gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 64;

/// Default delay after the first lost race.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(1);

/// Default upper bound on a single delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(100);

/// Bounds and pacing of the read-modify-CAS loops in the entity layer.
///
/// After attempt `n` loses its race the loop sleeps
/// `initial_backoff * 2^(n-1)`, capped at `max_backoff`. Once `max_attempts`
/// attempts have lost, the operation fails with `StoreError::RetriesExhausted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (at least one is always made).
    pub max_attempts: u32,
    /// Delay after the first lost race.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// A policy with the given attempt budget and default pacing.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Effective attempt budget.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after losing attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1 << exponent)
            .min(self.max_backoff)
    }

    /// Sleep for the backoff of `attempt`.
    pub(crate) async fn pause(&self, attempt: u32) {
        let delay = self.backoff(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
