use async_trait::async_trait;
use chrono::{DateTime, Utc};
use order_engine_types::{MarketOrder, OrderId, OrderSide, OrderStatus, OrderType, Venue};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════
// CORE TYPES
// ═══════════════════════════════════════════════════════════════════════════

/// Persistent order record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: OrderId,
    pub order_type: OrderType,
    pub base_mint: String,
    pub quote_mint: String,
    pub side: OrderSide,
    pub amount: Decimal,
    pub slippage_bps: u32,
    pub status: OrderStatus,
    pub routed_venue: Option<Venue>,
    pub tx_hash: Option<String>,
    pub execution_price: Option<Decimal>,
    pub failure_reason: Option<String>,
    /// Attempts spent, recorded with a terminal failure
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    /// A fresh `pending` record for a validated order
    pub fn pending(id: OrderId, order: &MarketOrder) -> Self {
        let now = Utc::now();
        Self {
            id,
            order_type: order.order_type,
            base_mint: order.base_mint.clone(),
            quote_mint: order.quote_mint.clone(),
            side: order.side,
            amount: order.amount,
            slippage_bps: order.slippage_bps,
            status: OrderStatus::Pending,
            routed_venue: None,
            tx_hash: None,
            execution_price: None,
            failure_reason: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Status change history entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransition {
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════
// ERROR TYPES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order not found: {0}")]
    NotFound(OrderId),

    #[error("duplicate order ID: {0}")]
    DuplicateId(OrderId),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("connection error: {0}")]
    ConnectionError(String),
}

// ═══════════════════════════════════════════════════════════════════════════
// STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════

/// Order storage trait - can be implemented for different backends
///
/// Every update bumps `updated_at` and appends a [`StatusTransition`] when the
/// status changes. Updates to unknown ids fail with [`StoreError::NotFound`].
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new `pending` order
    async fn create_pending(&self, order: &OrderRecord) -> Result<(), StoreError>;

    /// Move an order to `status` with no other field changes
    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<(), StoreError>;

    /// Record the venue chosen by routing
    async fn update_routing(&self, id: OrderId, venue: Venue) -> Result<(), StoreError>;

    /// Mark the order `confirmed` with its settlement reference and price
    async fn update_success(
        &self,
        id: OrderId,
        tx_hash: &str,
        execution_price: Decimal,
    ) -> Result<(), StoreError>;

    /// Mark the order `failed` with the final error and attempts spent
    async fn update_failure(
        &self,
        id: OrderId,
        reason: &str,
        attempts: u32,
    ) -> Result<(), StoreError>;

    /// Get order by ID
    async fn get(&self, id: OrderId) -> Result<Option<OrderRecord>, StoreError>;

    /// Oldest-first orders currently in `status`
    async fn list_by_status(
        &self,
        status: OrderStatus,
        limit: usize,
    ) -> Result<Vec<OrderRecord>, StoreError>;

    /// Status history for an order, oldest first
    async fn get_history(&self, id: OrderId) -> Result<Vec<StatusTransition>, StoreError>;
}

// ═══════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, OrderRecord>>>,
    transitions: Arc<RwLock<HashMap<OrderId, Vec<StatusTransition>>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of orders
    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }

    /// Apply `change` to the stored order and log the status move, if any.
    fn modify<F>(&self, id: OrderId, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut OrderRecord),
    {
        let mut orders = self.orders.write();
        let order = orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        let from_status = order.status;
        change(order);
        order.updated_at = Utc::now();

        if order.status != from_status {
            self.transitions
                .write()
                .entry(id)
                .or_default()
                .push(StatusTransition {
                    from_status,
                    to_status: order.status,
                    at: order.updated_at,
                });
        }

        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_pending(&self, order: &OrderRecord) -> Result<(), StoreError> {
        let mut orders = self.orders.write();
        if orders.contains_key(&order.id) {
            return Err(StoreError::DuplicateId(order.id));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<(), StoreError> {
        self.modify(id, |order| order.status = status)
    }

    async fn update_routing(&self, id: OrderId, venue: Venue) -> Result<(), StoreError> {
        self.modify(id, |order| order.routed_venue = Some(venue))
    }

    async fn update_success(
        &self,
        id: OrderId,
        tx_hash: &str,
        execution_price: Decimal,
    ) -> Result<(), StoreError> {
        self.modify(id, |order| {
            order.status = OrderStatus::Confirmed;
            order.tx_hash = Some(tx_hash.to_string());
            order.execution_price = Some(execution_price);
        })
    }

    async fn update_failure(
        &self,
        id: OrderId,
        reason: &str,
        attempts: u32,
    ) -> Result<(), StoreError> {
        self.modify(id, |order| {
            order.status = OrderStatus::Failed;
            order.failure_reason = Some(reason.to_string());
            order.attempts = attempts;
        })
    }

    async fn get(&self, id: OrderId) -> Result<Option<OrderRecord>, StoreError> {
        Ok(self.orders.read().get(&id).cloned())
    }

    async fn list_by_status(
        &self,
        status: OrderStatus,
        limit: usize,
    ) -> Result<Vec<OrderRecord>, StoreError> {
        let mut results: Vec<_> = self
            .orders
            .read()
            .values()
            .filter(|o| o.status == status)
            .cloned()
            .collect();

        results.sort_by_key(|o| o.created_at);
        results.truncate(limit);
        Ok(results)
    }

    async fn get_history(&self, id: OrderId) -> Result<Vec<StatusTransition>, StoreError> {
        Ok(self
            .transitions
            .read()
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn create_test_order() -> OrderRecord {
        let order = MarketOrder {
            order_type: OrderType::Market,
            base_mint: "SOL".to_string(),
            quote_mint: "USDC".to_string(),
            side: OrderSide::Buy,
            amount: Decimal::ONE,
            slippage_bps: 250,
        };
        OrderRecord::pending(Uuid::new_v4(), &order)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryOrderStore::new();
        let order = create_test_order();

        store.create_pending(&order).await.unwrap();

        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.base_mint, "SOL");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = InMemoryOrderStore::new();
        let order = create_test_order();

        store.create_pending(&order).await.unwrap();
        assert!(matches!(
            store.create_pending(&order).await,
            Err(StoreError::DuplicateId(_))
        ));
    }

    #[tokio::test]
    async fn test_update_unknown_order() {
        let store = InMemoryOrderStore::new();
        let result = store.update_status(Uuid::new_v4(), OrderStatus::Routing).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_full_success_path() {
        let store = InMemoryOrderStore::new();
        let order = create_test_order();
        store.create_pending(&order).await.unwrap();

        store.update_status(order.id, OrderStatus::Routing).await.unwrap();
        store.update_routing(order.id, Venue::Raydium).await.unwrap();
        store.update_status(order.id, OrderStatus::Building).await.unwrap();
        store.update_status(order.id, OrderStatus::Submitted).await.unwrap();
        store
            .update_success(order.id, "0xfeed", Decimal::new(101, 0))
            .await
            .unwrap();

        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
        assert_eq!(stored.routed_venue, Some(Venue::Raydium));
        assert_eq!(stored.tx_hash.as_deref(), Some("0xfeed"));
        assert_eq!(stored.execution_price, Some(Decimal::new(101, 0)));
        assert!(stored.failure_reason.is_none());

        let history = store.get_history(order.id).await.unwrap();
        let statuses: Vec<_> = history.iter().map(|t| t.to_status).collect();
        assert_eq!(
            statuses,
            vec![
                OrderStatus::Routing,
                OrderStatus::Building,
                OrderStatus::Submitted,
                OrderStatus::Confirmed,
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_records_reason_and_attempts() {
        let store = InMemoryOrderStore::new();
        let order = create_test_order();
        store.create_pending(&order).await.unwrap();

        store
            .update_failure(order.id, "route provider unavailable", 3)
            .await
            .unwrap();

        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
        assert_eq!(
            stored.failure_reason.as_deref(),
            Some("route provider unavailable")
        );
        assert_eq!(stored.attempts, 3);
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let store = InMemoryOrderStore::new();
        for _ in 0..3 {
            store.create_pending(&create_test_order()).await.unwrap();
        }
        let confirmed = create_test_order();
        store.create_pending(&confirmed).await.unwrap();
        store
            .update_success(confirmed.id, "0x01", Decimal::ONE)
            .await
            .unwrap();

        assert_eq!(
            store.list_by_status(OrderStatus::Pending, 10).await.unwrap().len(),
            3
        );
        assert_eq!(
            store.list_by_status(OrderStatus::Pending, 2).await.unwrap().len(),
            2
        );
        assert_eq!(
            store.list_by_status(OrderStatus::Confirmed, 10).await.unwrap().len(),
            1
        );
    }
}
