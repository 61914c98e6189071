use std::time::Duration;

use order_engine_types::OrderStatus;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

/// Metrics collector for the order execution engine
///
/// Every collector owns its own [`Registry`], so independent instances (one
/// per test, say) never clash over metric names.
pub struct MetricsCollector {
    registry: Registry,

    // ═══════════════════════════════════════════════════════════════════════════
    // ORDER METRICS
    // ═══════════════════════════════════════════════════════════════════════════
    orders_submitted: IntCounter,
    orders_rejected: IntCounter,
    order_status: IntCounterVec,
    orders_in_flight: IntGauge,

    // ═══════════════════════════════════════════════════════════════════════════
    // EXECUTION METRICS
    // ═══════════════════════════════════════════════════════════════════════════
    attempt_failures: IntCounterVec,
    attempt_duration: HistogramVec,
    route_latency: Histogram,

    // ═══════════════════════════════════════════════════════════════════════════
    // STREAM METRICS
    // ═══════════════════════════════════════════════════════════════════════════
    active_observers: IntGauge,
    events_published: IntCounter,
}

impl MetricsCollector {
    /// Create a collector with a fresh registry
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_registry(Registry::new())
    }

    /// Create a collector that registers into `registry`
    pub fn with_registry(registry: Registry) -> Result<Self, MetricsError> {
        let orders_submitted = IntCounter::new(
            "order_engine_orders_submitted_total",
            "Total number of orders accepted for execution",
        )?;
        let orders_rejected = IntCounter::new(
            "order_engine_orders_rejected_total",
            "Total number of order submissions rejected by validation",
        )?;
        let order_status = IntCounterVec::new(
            Opts::new(
                "order_engine_order_status_total",
                "Total lifecycle transitions by target status",
            ),
            &["status"],
        )?;
        let orders_in_flight = IntGauge::new(
            "order_engine_orders_in_flight",
            "Orders accepted but not yet confirmed or failed",
        )?;
        let attempt_failures = IntCounterVec::new(
            Opts::new(
                "order_engine_attempt_failures_total",
                "Failed execution attempts, split by whether the attempt was the last",
            ),
            &["final"],
        )?;
        let attempt_duration = HistogramVec::new(
            HistogramOpts::new(
                "order_engine_attempt_duration_ms",
                "Execution attempt duration in milliseconds",
            )
            .buckets(vec![500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]),
            &["outcome"],
        )?;
        let route_latency = Histogram::with_opts(
            HistogramOpts::new(
                "order_engine_route_latency_ms",
                "Route provider latency in milliseconds",
            )
            .buckets(vec![50.0, 250.0, 500.0, 1000.0, 2000.0, 5000.0]),
        )?;
        let active_observers = IntGauge::new(
            "order_engine_active_observers",
            "Currently registered status stream observers",
        )?;
        let events_published = IntCounter::new(
            "order_engine_events_published_total",
            "Status events delivered to observers",
        )?;

        registry.register(Box::new(orders_submitted.clone()))?;
        registry.register(Box::new(orders_rejected.clone()))?;
        registry.register(Box::new(order_status.clone()))?;
        registry.register(Box::new(orders_in_flight.clone()))?;
        registry.register(Box::new(attempt_failures.clone()))?;
        registry.register(Box::new(attempt_duration.clone()))?;
        registry.register(Box::new(route_latency.clone()))?;
        registry.register(Box::new(active_observers.clone()))?;
        registry.register(Box::new(events_published.clone()))?;

        Ok(Self {
            registry,
            orders_submitted,
            orders_rejected,
            order_status,
            orders_in_flight,
            attempt_failures,
            attempt_duration,
            route_latency,
            active_observers,
            events_published,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ORDER METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record an order accepted and queued
    pub fn record_order_submitted(&self) {
        self.orders_submitted.inc();
        self.orders_in_flight.inc();
    }

    /// Record a submission rejected before any side effect
    pub fn record_order_rejected(&self) {
        self.orders_rejected.inc();
    }

    /// Record a lifecycle transition
    pub fn record_status(&self, status: OrderStatus) {
        self.order_status
            .with_label_values(&[status.as_str()])
            .inc();

        if status.is_terminal() {
            self.orders_in_flight.dec();
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXECUTION METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record one failed attempt
    pub fn record_attempt_failure(&self, is_final: bool) {
        let label = if is_final { "true" } else { "false" };
        self.attempt_failures.with_label_values(&[label]).inc();
    }

    /// Record how long an attempt ran and whether it succeeded
    pub fn record_attempt_duration(&self, succeeded: bool, duration: Duration) {
        let outcome = if succeeded { "success" } else { "failure" };
        self.attempt_duration
            .with_label_values(&[outcome])
            .observe(duration.as_millis() as f64);
    }

    /// Record route provider latency
    pub fn record_route_latency(&self, latency: Duration) {
        self.route_latency.observe(latency.as_millis() as f64);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STREAM METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn set_active_observers(&self, count: usize) {
        self.active_observers.set(count as i64);
    }

    pub fn record_events_published(&self, delivered: usize) {
        self.events_published.inc_by(delivered as u64);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPORT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Export metrics in Prometheus text format
    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::EncodingError(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::EncodingError(e.to_string()))
    }
}

/// Metrics error types
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("encoding error: {0}")]
    EncodingError(String),
    #[error("registry error: {0}")]
    RegistryError(String),
}

impl From<prometheus::Error> for MetricsError {
    fn from(e: prometheus::Error) -> Self {
        MetricsError::RegistryError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().unwrap();
        assert!(collector.export_metrics().is_ok());
    }

    #[test]
    fn test_collectors_are_independent() {
        let a = MetricsCollector::new().unwrap();
        let b = MetricsCollector::new().unwrap();

        a.record_order_submitted();

        assert!(a
            .export_metrics()
            .unwrap()
            .contains("order_engine_orders_submitted_total 1"));
        assert!(b
            .export_metrics()
            .unwrap()
            .contains("order_engine_orders_submitted_total 0"));
    }

    #[test]
    fn test_shared_registry_rejects_duplicates() {
        let registry = Registry::new();
        MetricsCollector::with_registry(registry.clone()).unwrap();

        assert!(matches!(
            MetricsCollector::with_registry(registry),
            Err(MetricsError::RegistryError(_))
        ));
    }

    #[test]
    fn test_record_order_lifecycle() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_order_submitted();
        collector.record_order_submitted();
        collector.record_status(OrderStatus::Routing);
        collector.record_status(OrderStatus::Confirmed);

        let metrics = collector.export_metrics().unwrap();
        assert!(metrics.contains("order_engine_order_status_total{status=\"routing\"} 1"));
        assert!(metrics.contains("order_engine_order_status_total{status=\"confirmed\"} 1"));
        assert!(metrics.contains("order_engine_orders_in_flight 1"));
    }

    #[test]
    fn test_record_execution_metrics() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_attempt_failure(false);
        collector.record_attempt_failure(true);
        collector.record_attempt_duration(true, Duration::from_millis(4_000));
        collector.record_route_latency(Duration::from_millis(2_000));

        let metrics = collector.export_metrics().unwrap();
        assert!(metrics.contains("order_engine_attempt_failures_total{final=\"true\"} 1"));
        assert!(metrics.contains("order_engine_attempt_failures_total{final=\"false\"} 1"));
        assert!(metrics.contains("order_engine_attempt_duration_ms"));
        assert!(metrics.contains("success"));
        assert!(metrics.contains("order_engine_route_latency_ms"));
    }

    #[test]
    fn test_stream_metrics() {
        let collector = MetricsCollector::new().unwrap();

        collector.set_active_observers(3);
        collector.record_events_published(2);

        let metrics = collector.export_metrics().unwrap();
        assert!(metrics.contains("order_engine_active_observers 3"));
        assert!(metrics.contains("order_engine_events_published_total 2"));
    }
}
