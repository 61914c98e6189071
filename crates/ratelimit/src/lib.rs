//! Flow control for the order execution engine
//!
//! - `SlidingWindowLimiter`: at most N starts in any rolling window; callers wait for a slot
//! - `BackpressureHandler`: bounded worker concurrency with owned permits
//! - `ExponentialBackoff` / `RetryPolicy`: attempt budget and delay between attempts

pub mod backoff;
pub mod backpressure;
pub mod limiter;

pub use backoff::{ExponentialBackoff, RetryPolicy};
pub use backpressure::{BackpressureError, BackpressureHandler, WorkerPermit};
pub use limiter::{RateLimitError, SlidingWindowLimiter};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tokio::time::{sleep, Instant};

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_with_backpressure() {
        let limiter = Arc::new(SlidingWindowLimiter::new(4, Duration::from_secs(60)).unwrap());
        let workers = BackpressureHandler::new(2).unwrap();
        let starts = Arc::new(Mutex::new(Vec::new()));
        let mut handles = vec![];

        for _ in 0..6 {
            let permit = workers.acquire().await.unwrap();
            limiter.acquire().await;
            let starts = starts.clone();
            handles.push(tokio::spawn(async move {
                starts.lock().await.push(Instant::now());
                sleep(Duration::from_millis(50)).await;
                drop(permit);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        let starts = starts.lock().await;
        assert_eq!(starts.len(), 6);
        // Fifth start must wait for the first to leave the window.
        assert!(starts[4].duration_since(starts[0]) >= Duration::from_secs(60));
        assert_eq!(workers.current_concurrent(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_policy_drives_backoff_sleeps() {
        let policy = RetryPolicy::exponential(3, Duration::from_millis(2_000));
        let started = Instant::now();
        let mut attempt = 1;

        while let Some(delay) = policy.delay_after(attempt) {
            sleep(delay).await;
            attempt += 1;
        }

        assert_eq!(attempt, 3);
        assert!(started.elapsed() >= Duration::from_millis(6_000));
    }
}
