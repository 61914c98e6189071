use order_engine_metrics::MetricsCollector;
use order_engine_queue::{Enqueued, JobScheduler};
use order_engine_store::{OrderRecord, OrderStore, StatusTransition, StoreError};
use order_engine_types::{MarketOrderRequest, OrderId, OrderJob};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::SubmitError;

/// Submission path: validate, record `pending`, then queue for execution.
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    scheduler: JobScheduler,
    metrics: Option<Arc<MetricsCollector>>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, scheduler: JobScheduler) -> Self {
        Self {
            store,
            scheduler,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    /// Accept a market order and return its id.
    ///
    /// Nothing is stored when validation fails. The pending record always
    /// exists before the job is queued.
    pub async fn submit_market_order(
        &self,
        request: &MarketOrderRequest,
    ) -> Result<OrderId, SubmitError> {
        let order = match request.validate() {
            Ok(order) => order,
            Err(e) => {
                debug!(error = %e, "order rejected");
                if let Some(metrics) = &self.metrics {
                    metrics.record_order_rejected();
                }
                return Err(e.into());
            }
        };

        let order_id = Uuid::new_v4();
        self.store
            .create_pending(&OrderRecord::pending(order_id, &order))
            .await?;

        match self.scheduler.enqueue(OrderJob::from_order(order_id, &order)) {
            Ok(Enqueued::Added) => {}
            Ok(Enqueued::Duplicate(state)) => {
                warn!(%order_id, ?state, "fresh order id already queued");
            }
            Err(e) => {
                // The record must not sit in `pending` with nothing to run it.
                if let Err(store_err) = self
                    .store
                    .update_failure(order_id, &e.to_string(), 0)
                    .await
                {
                    warn!(%order_id, error = %store_err, "could not mark unqueued order failed");
                }
                return Err(e.into());
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_order_submitted();
        }
        info!(
            %order_id,
            base = %order.base_mint,
            quote = %order.quote_mint,
            side = %order.side,
            amount = %order.amount,
            slippage_bps = order.slippage_bps,
            "order accepted"
        );

        Ok(order_id)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>, StoreError> {
        self.store.get(order_id).await
    }

    pub async fn order_history(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<StatusTransition>, StoreError> {
        self.store.get_history(order_id).await
    }
}
