use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use order_engine_ratelimit::{
    BackpressureError, BackpressureHandler, RateLimitError, RetryPolicy, SlidingWindowLimiter,
    WorkerPermit,
};
use order_engine_types::{OrderId, OrderJob, MAX_ATTEMPTS};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::{Enqueued, JobFailure, JobHandler, JobState};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler already started")]
    AlreadyStarted,

    #[error("scheduler is closed")]
    Closed,

    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(String),
}

impl From<RateLimitError> for SchedulerError {
    fn from(e: RateLimitError) -> Self {
        SchedulerError::InvalidConfig(e.to_string())
    }
}

impl From<BackpressureError> for SchedulerError {
    fn from(e: BackpressureError) -> Self {
        SchedulerError::InvalidConfig(e.to_string())
    }
}

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub name: String,
    /// Worker pool size
    pub concurrency: u32,
    /// Job starts admitted per `rate_window`
    pub max_per_window: u32,
    pub rate_window: Duration,
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each further failure
    pub backoff_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "order-execution".to_string(),
            concurrency: 10,
            max_per_window: 100,
            rate_window: Duration::from_secs(60),
            max_attempts: MAX_ATTEMPTS,
            backoff_delay: Duration::from_millis(2_000),
        }
    }
}

impl SchedulerConfig {
    pub fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_rate_limit(mut self, max_per_window: u32, rate_window: Duration) -> Self {
        self.max_per_window = max_per_window;
        self.rate_window = rate_window;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff_delay: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.backoff_delay = backoff_delay;
        self
    }
}

struct QueuedJob {
    job: OrderJob,
    attempts_made: u32,
}

struct Inner {
    config: SchedulerConfig,
    handler: Arc<dyn JobHandler>,
    jobs: DashMap<OrderId, JobState>,
    ready_tx: mpsc::UnboundedSender<QueuedJob>,
    ready_rx: Mutex<Option<mpsc::UnboundedReceiver<QueuedJob>>>,
    limiter: SlidingWindowLimiter,
    workers: BackpressureHandler,
    retry: RetryPolicy,
    failures: broadcast::Sender<JobFailure>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

/// Rate-limited, concurrency-bounded job queue keyed by order id.
#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<Inner>,
}

impl JobScheduler {
    pub fn new(
        config: SchedulerConfig,
        handler: Arc<dyn JobHandler>,
    ) -> Result<Self, SchedulerError> {
        let limiter = SlidingWindowLimiter::new(config.max_per_window, config.rate_window)?;
        let workers = BackpressureHandler::new(config.concurrency)?;
        let retry = RetryPolicy::exponential(config.max_attempts, config.backoff_delay);
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let (failures, _) = broadcast::channel(256);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                handler,
                jobs: DashMap::new(),
                ready_tx,
                ready_rx: Mutex::new(Some(ready_rx)),
                limiter,
                workers,
                retry,
                failures,
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Begin dispatching queued jobs to workers.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let rx = self
            .inner
            .ready_rx
            .lock()
            .take()
            .ok_or(SchedulerError::AlreadyStarted)?;

        let inner = self.inner.clone();
        self.inner.tracker.spawn(inner.dispatch(rx));

        tracing::info!(
            queue = %self.inner.config.name,
            concurrency = self.inner.config.concurrency,
            max_per_window = self.inner.config.max_per_window,
            "scheduler started"
        );
        Ok(())
    }

    /// Queue `job` unless its order id is already known to the scheduler.
    pub fn enqueue(&self, job: OrderJob) -> Result<Enqueued, SchedulerError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SchedulerError::Closed);
        }

        let order_id = job.order_id;
        match self.inner.jobs.entry(order_id) {
            Entry::Occupied(existing) => {
                let state = *existing.get();
                tracing::debug!(%order_id, ?state, "duplicate enqueue ignored");
                return Ok(Enqueued::Duplicate(state));
            }
            Entry::Vacant(slot) => {
                slot.insert(JobState::Waiting);
            }
        }

        if self
            .inner
            .ready_tx
            .send(QueuedJob {
                job,
                attempts_made: 0,
            })
            .is_err()
        {
            self.inner.jobs.remove(&order_id);
            return Err(SchedulerError::Closed);
        }

        tracing::debug!(%order_id, "job enqueued");
        Ok(Enqueued::Added)
    }

    /// A receiver for every failed attempt from now on.
    pub fn failures(&self) -> broadcast::Receiver<JobFailure> {
        self.inner.failures.subscribe()
    }

    pub fn job_state(&self, order_id: OrderId) -> Option<JobState> {
        self.inner.jobs.get(&order_id).map(|state| *state)
    }

    /// Attempts currently holding a worker.
    pub fn active_count(&self) -> u32 {
        self.inner.workers.current_concurrent()
    }

    pub fn waiting_count(&self) -> usize {
        self.inner
            .jobs
            .iter()
            .filter(|entry| matches!(*entry.value(), JobState::Waiting | JobState::Delayed))
            .count()
    }

    /// Stop dispatching and wait for in-flight attempts to finish.
    ///
    /// Jobs still waiting or backing off are abandoned.
    pub async fn close(&self) {
        self.inner.shutdown.cancel();
        self.inner.workers.close();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        tracing::info!(queue = %self.inner.config.name, "scheduler closed");
    }
}

impl Inner {
    async fn dispatch(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<QueuedJob>) {
        loop {
            let queued = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                next = rx.recv() => match next {
                    Some(queued) => queued,
                    None => break,
                },
            };

            // A worker slot first, then a start slot, so a start is only
            // counted when the job can run immediately.
            let permit = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                permit = self.workers.acquire() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = self.limiter.acquire() => {}
            }

            let inner = self.clone();
            self.tracker.spawn(inner.run_attempt(queued, permit));
        }

        tracing::debug!(queue = %self.config.name, "dispatcher stopped");
    }

    async fn run_attempt(self: Arc<Self>, queued: QueuedJob, permit: WorkerPermit) {
        let QueuedJob { job, attempts_made } = queued;
        let attempt = attempts_made + 1;
        let order_id = job.order_id;

        self.jobs.insert(order_id, JobState::Active);

        let span = tracing::info_span!("order_attempt", %order_id, attempt);
        let result = match AssertUnwindSafe(self.handler.process(&job, attempt))
            .catch_unwind()
            .instrument(span)
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(%order_id, attempt, panic = %message, "attempt panicked");
                Err(anyhow::anyhow!("attempt panicked: {message}"))
            }
        };
        drop(permit);

        let error = match result {
            Ok(()) => {
                self.jobs.remove(&order_id);
                tracing::info!(%order_id, attempt, "job completed");
                return;
            }
            Err(error) => error,
        };

        let failure = JobFailure {
            order_id,
            attempt,
            max_attempts: self.retry.max_attempts(),
            error: error.to_string(),
            is_final: self.retry.is_final(attempt),
        };

        // No receivers is fine; the event is informational.
        let _ = self.failures.send(failure.clone());
        self.handler.on_failed(&job, &failure).await;

        match self.retry.delay_after(attempt) {
            None => {
                self.jobs.remove(&order_id);
                tracing::warn!(%order_id, attempt, "job failed permanently");
            }
            Some(delay) => {
                self.jobs.insert(order_id, JobState::Delayed);
                tracing::debug!(
                    %order_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retry scheduled"
                );

                let inner = self.clone();
                self.tracker.spawn(async move {
                    tokio::select! {
                        _ = inner.shutdown.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {
                            inner.jobs.insert(order_id, JobState::Waiting);
                            let _ = inner.ready_tx.send(QueuedJob {
                                job,
                                attempts_made: attempt,
                            });
                        }
                    }
                });
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
