//! When and how long to wait before repeating a rate request.

use bdagg_core::config::RatesConfig;
use std::time::Duration;

/// Statuses that signal a transient upstream condition.
const TRANSIENT_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Doubling backoff with equal jitter, bounded by `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry, before jitter.
    pub base_delay: Duration,
    /// Upper bound of a single wait.
    pub max_delay: Duration,
}

impl From<&RatesConfig> for RetryPolicy {
    fn from(config: &RatesConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RatesConfig::default())
    }
}

impl RetryPolicy {
    /// Whether retry number `attempt` (0-based) may still run.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Whether a response with `status` is worth repeating.
    pub fn is_transient(status: u16) -> bool {
        TRANSIENT_STATUSES.contains(&status)
    }

    /// Ceiling of the wait before retry `attempt`: `base * 2^attempt`, capped.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }

    /// Wait before retry `attempt`, uniformly drawn from the upper half of
    /// its ceiling.
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        let half = ceiling / 2;
        let spread = (ceiling - half).as_millis() as u64;
        half + Duration::from_millis(fastrand::u64(0..=spread))
    }
}
