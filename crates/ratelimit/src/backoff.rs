use std::time::Duration;

/// Delay that grows by `multiplier` per retry, capped at `max`.
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            multiplier: 2.0,
        }
    }

    /// Delay before retry number `retry` (0-based), capped at `max`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry as i32);
        let delay_ms = (self.initial.as_millis() as f64 * factor).min(self.max.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }
}

/// Attempt budget plus the backoff between attempts.
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: ExponentialBackoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: ExponentialBackoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Doubling backoff starting at `base_delay`.
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self::new(
            max_attempts,
            ExponentialBackoff::new(base_delay, Duration::from_secs(3_600)),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_final(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    /// How long to wait after `attempt` (1-based) failed, or `None` once the
    /// budget is spent.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if self.is_final(attempt) {
            None
        } else {
            Some(self.backoff.delay_for(attempt.saturating_sub(1)))
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_millis(2_000))
    }
}
