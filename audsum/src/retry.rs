//! Retry backoff with jitter for the remote collaborators.

use rand::Rng;
use std::time::Duration;

/// Backoff configuration for retried API calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum attempts, including the first.
    pub max_attempts: usize,
    /// Base delay between retries in milliseconds.
    pub base_delay_ms: u64,
    /// Delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Randomize each delay over `0..=delay` to avoid thundering herds.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Sets the maximum attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub const fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Disables jitter (useful in tests).
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// The delay before retrying after `attempt` (0-indexed) failed,
    /// exponential and capped.
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.min(u32::MAX as usize) as u32))
            .min(self.max_delay_ms);

        let ms = if self.jitter && exp > 0 {
            rand::thread_rng().gen_range(0..=exp)
        } else {
            exp
        };
        Duration::from_millis(ms)
    }
}
