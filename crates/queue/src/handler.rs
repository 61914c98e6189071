use async_trait::async_trait;
use order_engine_types::OrderJob;

use crate::JobFailure;

/// Work run by the scheduler's workers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run one attempt. `attempt` starts at 1.
    async fn process(&self, job: &OrderJob, attempt: u32) -> anyhow::Result<()>;

    /// Called after every failed attempt, with `failure.is_final` set on the
    /// last one.
    async fn on_failed(&self, job: &OrderJob, failure: &JobFailure);
}
