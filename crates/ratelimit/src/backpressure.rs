use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Error)]
pub enum BackpressureError {
    #[error("Concurrency limit must be at least 1")]
    InvalidLimit,
    #[error("Concurrency limit has been closed")]
    Closed,
}

/// Bounds how many units of work run at once.
///
/// Permits are owned so they can travel into spawned tasks; the slot frees
/// when the permit is dropped.
#[derive(Clone)]
pub struct BackpressureHandler {
    processing: Arc<AtomicU32>,
    semaphore: Arc<Semaphore>,
}

pub struct WorkerPermit {
    _permit: OwnedSemaphorePermit,
    processing: Arc<AtomicU32>,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        self.processing.fetch_sub(1, Ordering::SeqCst);
    }
}

impl BackpressureHandler {
    pub fn new(max_concurrent: u32) -> Result<Self, BackpressureError> {
        if max_concurrent == 0 {
            return Err(BackpressureError::InvalidLimit);
        }

        Ok(Self {
            processing: Arc::new(AtomicU32::new(0)),
            semaphore: Arc::new(Semaphore::new(max_concurrent as usize)),
        })
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<WorkerPermit, BackpressureError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BackpressureError::Closed)?;

        self.processing.fetch_add(1, Ordering::SeqCst);
        Ok(WorkerPermit {
            _permit: permit,
            processing: self.processing.clone(),
        })
    }

    /// Stop handing out permits; pending `acquire` calls fail.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn current_concurrent(&self) -> u32 {
        self.processing.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[test]
    fn test_rejects_zero_limit() {
        assert!(matches!(
            BackpressureHandler::new(0),
            Err(BackpressureError::InvalidLimit)
        ));
    }

    #[tokio::test]
    async fn test_permit_release_on_drop() {
        let handler = BackpressureHandler::new(1).unwrap();

        let permit = handler.acquire().await.unwrap();
        assert_eq!(handler.current_concurrent(), 1);

        drop(permit);
        assert_eq!(handler.current_concurrent(), 0);
        let _again = handler.acquire().await.unwrap();
        assert_eq!(handler.current_concurrent(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_limit() {
        let handler = BackpressureHandler::new(2).unwrap();
        let peak = Arc::new(AtomicU32::new(0));
        let mut handles = vec![];

        for _ in 0..6 {
            let permit = handler.acquire().await.unwrap();
            let h = handler.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                peak.fetch_max(h.current_concurrent(), Ordering::SeqCst);
                sleep(Duration::from_millis(20)).await;
                drop(permit);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(handler.current_concurrent(), 0);
    }

    #[tokio::test]
    async fn test_close_fails_waiters() {
        let handler = BackpressureHandler::new(1).unwrap();
        let _held = handler.acquire().await.unwrap();

        handler.close();
        assert!(matches!(
            handler.acquire().await,
            Err(BackpressureError::Closed)
        ));
    }
}
