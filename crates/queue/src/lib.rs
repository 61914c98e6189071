//! Order job scheduling.
//!
//! [`JobScheduler`] admits one live job per order id, starts at most
//! `max_per_minute` jobs in any rolling minute, runs at most `concurrency` at
//! once, and retries failures with doubling backoff until the attempt budget
//! is spent.

mod handler;
mod job;
mod scheduler;

pub use handler::JobHandler;
pub use job::{Enqueued, JobFailure, JobState};
pub use scheduler::{JobScheduler, SchedulerConfig, SchedulerError};
