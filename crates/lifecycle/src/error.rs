use order_engine_queue::SchedulerError;
use order_engine_router::RouteError;
use order_engine_store::StoreError;
use order_engine_types::{OrderId, OrderStatus, ValidationError};
use thiserror::Error;

/// Why one execution attempt stopped short of `confirmed`.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("routing failed: {0}")]
    Route(#[from] RouteError),

    #[error("route provider did not answer within {0} ms")]
    RouteTimeout(u64),

    #[error("order store failed: {0}")]
    Store(#[from] StoreError),

    #[error("order {0} not found")]
    UnknownOrder(OrderId),

    #[error("order {order_id} is already {status}")]
    AlreadyTerminal {
        order_id: OrderId,
        status: OrderStatus,
    },

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

/// Why a submission was not accepted.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to record order: {0}")]
    Store(#[from] StoreError),

    #[error("failed to queue order: {0}")]
    Queue(#[from] SchedulerError),
}
