//! Retry policy for the external similarity service
//! An explicit policy object so backoff can be unit-tested without a clock

use std::time::Duration;

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first (default: 3)
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles each retry (default: 1.25s)
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1250),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
        }
    }

    /// Backoff to sleep after the given failed attempt (0-based).
    /// Exponential: base, 2*base, 4*base, ...
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_backoff.saturating_mul(factor)
    }

    /// Whether another attempt is allowed after `attempt` (0-based) failed
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}
