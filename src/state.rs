use std::sync::Arc;

use order_engine_lifecycle::OrderService;
use order_engine_metrics::MetricsCollector;
use order_engine_stream::OrderStream;

/// Shared handles for request handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OrderService>,
    pub stream: Arc<OrderStream>,
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    pub fn new(
        service: Arc<OrderService>,
        stream: Arc<OrderStream>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            service,
            stream,
            metrics,
        }
    }

    /// Refresh the observer gauge from the registry.
    pub fn sync_observer_gauge(&self) {
        self.metrics
            .set_active_observers(self.stream.total_listeners());
    }
}
