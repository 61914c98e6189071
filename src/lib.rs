//! HTTP and WebSocket front end for the order execution engine.
//!
//! - `POST /api/orders/execute` accepts a market order and answers `202` with
//!   its id
//! - `GET /api/orders/execute?orderId=<uuid>` upgrades to a WebSocket that
//!   streams the order's status events
//! - `GET /api/orders/:id` returns the stored order and its status history
//! - `GET /metrics` and `GET /health`

pub mod api;
pub mod error;
pub mod state;
pub mod websocket;

use axum::{
    routing::{get, post},
    Router,
};
use order_engine_metrics::metrics_router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use error::ApiError;
pub use state::AppState;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let metrics = metrics_router(state.metrics.clone());

    Router::new()
        .route(
            "/api/orders/execute",
            post(api::execute_order).get(websocket::ws_handler),
        )
        .route("/api/orders/:id", get(api::get_order))
        .with_state(state)
        .merge(metrics)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
