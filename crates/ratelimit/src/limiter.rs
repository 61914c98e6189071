use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("Rate limit exceeded, next slot in {0:?}")]
    LimitExceeded(Duration),
    #[error("Invalid rate limit configuration")]
    InvalidConfig,
}

/// Admits at most `max_starts` acquisitions in any rolling `window`.
///
/// Callers over the limit either get an error from [`try_acquire`] or wait in
/// [`acquire`] until the oldest start leaves the window.
///
/// [`try_acquire`]: SlidingWindowLimiter::try_acquire
/// [`acquire`]: SlidingWindowLimiter::acquire
pub struct SlidingWindowLimiter {
    max_starts: u32,
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_starts: u32, window: Duration) -> Result<Self, RateLimitError> {
        if max_starts == 0 || window.is_zero() {
            return Err(RateLimitError::InvalidConfig);
        }

        Ok(Self {
            max_starts,
            window,
            starts: Mutex::new(VecDeque::with_capacity(max_starts as usize)),
        })
    }

    fn prune(&self, starts: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = starts.front() {
            if now.duration_since(*oldest) >= self.window {
                starts.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record a start if the window has room.
    pub fn try_acquire(&self) -> Result<(), RateLimitError> {
        let now = Instant::now();
        let mut starts = self.starts.lock();
        self.prune(&mut starts, now);

        if starts.len() < self.max_starts as usize {
            starts.push_back(now);
            return Ok(());
        }

        // Full window: the oldest start decides when the next slot opens.
        let wait = starts
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or_default();
        Err(RateLimitError::LimitExceeded(wait))
    }

    /// Wait until a start is admitted.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire() {
                Ok(()) => return,
                Err(RateLimitError::LimitExceeded(wait)) => {
                    tracing::debug!(wait_ms = wait.as_millis() as u64, "start rate limited");
                    tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
                }
                Err(RateLimitError::InvalidConfig) => return,
            }
        }
    }
}
