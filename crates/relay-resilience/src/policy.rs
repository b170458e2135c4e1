//! Retry policy: a node's `{maxAttempts, initialDelayMs, backoffMultiplier}`
//! config turned into a runnable backoff schedule.
//!
//! Grounded on `resilience/examples/retry_manager_demo.rs`'s exponential
//! strategy, but const generics (`exponential_retry::<3>()`) become plain
//! runtime fields: the `retry` node's config is data read at dispatch time,
//! not known at compile time.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff_multiplier: backoff_multiplier.max(1.0),
            max_delay: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before attempt `attempt` (1-indexed; attempt 1 is the first
    /// retry, following the initial, uncounted call).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor).min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100), 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), 2.0);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let policy = RetryPolicy::new(10, Duration::from_millis(1000), 3.0).with_max_delay(Duration::from_secs(2));
        assert_eq!(policy.delay_for(5), Duration::from_secs(2));
    }

    #[test]
    fn max_attempts_is_floored_at_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, 1.0).max_attempts, 1);
    }
}
