//! Metrics and tracing for the order execution engine
//!
//! # Features
//!
//! - Prometheus counters for submissions, lifecycle transitions, attempt
//!   failures and stream fan-out
//! - HTTP routes for metrics scraping and liveness
//! - Tracing subscriber setup with JSON or human-readable output
//!
//! # Example
//!
//! ```no_run
//! use order_engine_metrics::{MetricsCollector, MetricsServer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let collector = Arc::new(MetricsCollector::new().unwrap());
//!     collector.record_order_submitted();
//!
//!     let server = MetricsServer::new(collector.clone(), "0.0.0.0:9090".to_string());
//!     server.serve(std::future::pending()).await.unwrap();
//! }
//! ```

pub mod collector;
pub mod http;
pub mod tracing;

pub use collector::{MetricsCollector, MetricsError};
pub use http::{metrics_router, MetricsServer, MetricsServerError};
pub use tracing::{env_filter, init_tracing, TracingError, DEFAULT_FILTER};
