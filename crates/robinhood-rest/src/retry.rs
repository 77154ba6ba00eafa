//! Retry schedule with linear backoff

use std::time::Duration;

/// Retries allowed after the first attempt
pub const MAX_RETRIES: u32 = 3;

/// Backoff unit; attempt `n` waits `n` units
pub const RETRY_DELAY_UNIT: Duration = Duration::from_secs(1);

/// Fixed retry schedule for transient failures
///
/// Attempts are numbered from 0. Attempt 0 runs immediately; attempt `n`
/// waits `RETRY_DELAY_UNIT * n` first. At most `MAX_RETRIES + 1` attempts
/// are made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            delay_unit: RETRY_DELAY_UNIT,
        }
    }
}

impl RetryPolicy {
    /// Total attempts, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.delay_unit.saturating_mul(attempt)
    }

    /// Check if another attempt may follow `attempt`
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}
