use async_trait::async_trait;
use order_engine_metrics::MetricsCollector;
use order_engine_queue::{JobFailure, JobHandler};
use order_engine_router::RouteProvider;
use order_engine_store::OrderStore;
use order_engine_stream::OrderStream;
use order_engine_types::{EventDetail, OrderId, OrderJob, OrderStatus, RouteDecision, Venue};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::LifecycleError;

/// Timed steps between routing and confirmation.
#[derive(Debug, Clone)]
pub struct StageTimings {
    /// Transaction construction, before `submitted`
    pub build_delay: Duration,
    /// Settlement wait, before `confirmed`
    pub submit_delay: Duration,
    /// Upper bound on the route call; unbounded when `None`
    pub route_timeout: Option<Duration>,
}

impl Default for StageTimings {
    fn default() -> Self {
        Self {
            build_delay: Duration::from_millis(1_000),
            submit_delay: Duration::from_millis(1_000),
            route_timeout: None,
        }
    }
}

/// Result of an attempt that reached `confirmed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub order_id: OrderId,
    pub venue: Venue,
    pub tx_hash: String,
    pub execution_price: Decimal,
}

/// Order state machine.
///
/// Every step writes to the store first and publishes to observers second, so
/// an observer never sees a status the store does not hold.
pub struct LifecycleEngine {
    store: Arc<dyn OrderStore>,
    router: Arc<dyn RouteProvider>,
    stream: Arc<OrderStream>,
    metrics: Option<Arc<MetricsCollector>>,
    timings: StageTimings,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<dyn OrderStore>,
        router: Arc<dyn RouteProvider>,
        stream: Arc<OrderStream>,
        timings: StageTimings,
    ) -> Self {
        Self {
            store,
            router,
            stream,
            metrics: None,
            timings,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn timings(&self) -> &StageTimings {
        &self.timings
    }

    /// Run one attempt for `job`, from `routing` to `confirmed`.
    ///
    /// A retry (`attempt > 1`) restarts at `routing` from whatever stage the
    /// previous attempt reached, so observers may see earlier stages again.
    pub async fn process_order_lifecycle(
        &self,
        job: &OrderJob,
        attempt: u32,
    ) -> Result<ExecutionOutcome, LifecycleError> {
        let order_id = job.order_id;
        let current = self
            .store
            .get(order_id)
            .await?
            .ok_or(LifecycleError::UnknownOrder(order_id))?
            .status;

        if current.is_terminal() {
            return Err(LifecycleError::AlreadyTerminal {
                order_id,
                status: current,
            });
        }

        // 1. Routing
        let restart = attempt > 1;
        if !(current.can_transition_to(OrderStatus::Routing) || restart) {
            return Err(LifecycleError::InvalidTransition {
                from: current,
                to: OrderStatus::Routing,
            });
        }
        info!(%order_id, attempt, restart, "routing order");
        self.store
            .update_status(order_id, OrderStatus::Routing)
            .await?;
        self.announce(order_id, OrderStatus::Routing, None);

        // 2. Route selection
        let route = self.select_route(job).await?;
        self.store.update_routing(order_id, route.venue).await?;
        self.store
            .update_status(order_id, OrderStatus::Building)
            .await?;
        info!(
            %order_id,
            venue = %route.venue,
            price = %route.price,
            quotes = route.quotes.len(),
            "route selected, building transaction"
        );
        self.announce(
            order_id,
            OrderStatus::Building,
            Some(EventDetail::Routed {
                venue: route.venue,
                quotes: route.quotes.clone(),
            }),
        );

        // 3. Construction, then submission
        tokio::time::sleep(self.timings.build_delay).await;
        self.store
            .update_status(order_id, OrderStatus::Submitted)
            .await?;
        debug!(%order_id, tx_hash = %route.tx_hash, "transaction submitted");
        self.announce(
            order_id,
            OrderStatus::Submitted,
            Some(EventDetail::Submitted {
                tx_hash: route.tx_hash.clone(),
            }),
        );

        tokio::time::sleep(self.timings.submit_delay).await;

        // 4. Confirmation
        self.store
            .update_success(order_id, &route.tx_hash, route.price)
            .await?;
        info!(
            %order_id,
            venue = %route.venue,
            tx_hash = %route.tx_hash,
            execution_price = %route.price,
            "order confirmed"
        );
        self.announce(
            order_id,
            OrderStatus::Confirmed,
            Some(EventDetail::Confirmed {
                tx_hash: route.tx_hash.clone(),
                execution_price: route.price,
                venue: route.venue,
            }),
        );

        Ok(ExecutionOutcome {
            order_id,
            venue: route.venue,
            tx_hash: route.tx_hash,
            execution_price: route.price,
        })
    }

    /// Persist a terminal failure and tell observers, in that order.
    pub async fn fail_order(
        &self,
        order_id: OrderId,
        reason: &str,
        attempts: u32,
    ) -> Result<(), LifecycleError> {
        self.store.update_failure(order_id, reason, attempts).await?;
        warn!(%order_id, attempts, reason, "order failed");
        self.announce(
            order_id,
            OrderStatus::Failed,
            Some(EventDetail::Failed {
                reason: reason.to_string(),
                attempts,
            }),
        );
        Ok(())
    }

    async fn select_route(&self, job: &OrderJob) -> Result<RouteDecision, LifecycleError> {
        let started = Instant::now();
        let request = self
            .router
            .best_route(&job.base_mint, &job.quote_mint, job.amount);

        let route = match self.timings.route_timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| LifecycleError::RouteTimeout(limit.as_millis() as u64))??,
            None => request.await?,
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_route_latency(started.elapsed());
        }
        Ok(route)
    }

    fn announce(&self, order_id: OrderId, status: OrderStatus, detail: Option<EventDetail>) {
        let delivered = self.stream.publish(order_id, status, detail);
        if let Some(metrics) = &self.metrics {
            metrics.record_status(status);
            metrics.record_events_published(delivered);
        }
        debug!(%order_id, %status, delivered, "status published");
    }
}

#[async_trait]
impl JobHandler for LifecycleEngine {
    async fn process(&self, job: &OrderJob, attempt: u32) -> anyhow::Result<()> {
        let started = Instant::now();
        let result = self.process_order_lifecycle(job, attempt).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_attempt_duration(result.is_ok(), started.elapsed());
        }

        match result {
            Ok(_) => Ok(()),
            Err(LifecycleError::AlreadyTerminal { order_id, status }) => {
                warn!(%order_id, %status, "skipping job for finished order");
                Ok(())
            }
            Err(e) => {
                warn!(order_id = %job.order_id, attempt, error = %e, "attempt failed");
                Err(e.into())
            }
        }
    }

    async fn on_failed(&self, job: &OrderJob, failure: &JobFailure) {
        if let Some(metrics) = &self.metrics {
            metrics.record_attempt_failure(failure.is_final);
        }

        if !failure.is_final {
            return;
        }

        if let Err(e) = self
            .fail_order(job.order_id, &failure.error, failure.attempt)
            .await
        {
            error!(order_id = %job.order_id, error = %e, "failed to record order failure");
        }
    }
}
