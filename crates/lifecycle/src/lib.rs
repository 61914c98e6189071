//! Order lifecycle.
//!
//! [`LifecycleEngine`] drives one order through
//! `routing → building → submitted → confirmed`, persisting each step before
//! announcing it to observers, and records terminal failures once the
//! scheduler gives up. [`OrderService`] is the submission path in front of it.

mod engine;
mod error;
mod service;

pub use engine::{ExecutionOutcome, LifecycleEngine, StageTimings};
pub use error::{LifecycleError, SubmitError};
pub use service::OrderService;
