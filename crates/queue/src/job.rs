use order_engine_types::OrderId;
use serde::Serialize;

/// Where a job currently sits in the scheduler.
///
/// Only live jobs are tracked: an id is forgotten once it completes or
/// spends its last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Queued for a worker
    Waiting,
    /// A worker is running an attempt
    Active,
    /// Backing off before the next attempt
    Delayed,
}

/// Result of [`JobScheduler::enqueue`](crate::JobScheduler::enqueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Added,
    /// The id was already known; nothing was queued.
    Duplicate(JobState),
}

/// Raised for every failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub order_id: OrderId,
    pub attempt: u32,
    pub max_attempts: u32,
    pub error: String,
    pub is_final: bool,
}
