//! Redelivery backoff.

use std::time::Duration;

/// Exponential backoff between scan retries.
///
/// The delay for a job that has consumed `r` retries is
/// `min(2^r * base_delay, max_delay)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay unit multiplied by `2^retry_count`.
    pub base_delay: Duration,

    /// Upper bound on any delay.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(900),
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy with defaults (60s base, 15 minute cap).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Returns the delay before redelivering a job with `retry_count` retries.
    pub fn delay_for_retry(&self, retry_count: u32) -> Duration {
        let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}
