use async_trait::async_trait;
use chrono::{DateTime, Utc};
use order_engine_types::{OrderId, OrderStatus, Venue};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::store::{OrderRecord, OrderStore, StatusTransition, StoreError};

// ═══════════════════════════════════════════════════════════════════════════
// SQLITE STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteOrderStore {
    pool: SqlitePool,
}

/// Column changes applied together with a status write.
#[derive(Default)]
struct OrderUpdate<'a> {
    status: Option<OrderStatus>,
    routed_venue: Option<Venue>,
    tx_hash: Option<&'a str>,
    execution_price: Option<Decimal>,
    failure_reason: Option<&'a str>,
    attempts: Option<u32>,
}

impl SqliteOrderStore {
    /// Connect to `url` (e.g. `sqlite://orders.db?mode=rwc`) and run migrations
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        // Every connection to an in-memory database is a separate database,
        // so it must be a single connection that is never recycled.
        let in_memory = url.contains(":memory:");
        let max_connections = if in_memory { 1 } else { max_connections.max(1) };

        let mut connect_options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?
            .busy_timeout(BUSY_TIMEOUT);
        if !in_memory {
            // Readers never block the writer, and writers queue on the lock.
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        tracing::info!(url, max_connections, "order store connected");
        Ok(store)
    }

    /// Create an in-memory SQLite database
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<(), StoreError> {
        for migration in [
            include_str!("../migrations/001_create_orders.sql"),
            include_str!("../migrations/002_create_order_transitions.sql"),
            include_str!("../migrations/003_create_order_indexes.sql"),
        ] {
            sqlx::query(migration)
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
        }

        Ok(())
    }

    /// Apply `update` inside one transaction, logging the status move if any.
    ///
    /// Every statement is a write, so the transaction holds the write lock
    /// from its first statement and never has to upgrade a read lock.
    async fn apply(&self, id: OrderId, update: OrderUpdate<'_>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let now = Utc::now().timestamp_millis();

        if let Some(to_status) = update.status {
            sqlx::query(
                r#"
                INSERT INTO order_transitions (order_id, from_status, to_status, at)
                SELECT id, status, ?, ? FROM orders WHERE id = ? AND status != ?
                "#,
            )
            .bind(to_status.as_str())
            .bind(now)
            .bind(id.to_string())
            .bind(to_status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        let updated = sqlx::query(
            r#"
            UPDATE orders SET
                status = COALESCE(?, status),
                routed_venue = COALESCE(?, routed_venue),
                tx_hash = COALESCE(?, tx_hash),
                execution_price = COALESCE(?, execution_price),
                failure_reason = COALESCE(?, failure_reason),
                attempts = COALESCE(?, attempts),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.routed_venue.map(|v| v.as_str()))
        .bind(update.tx_hash)
        .bind(update.execution_price.map(|p| p.to_string()))
        .bind(update.failure_reason)
        .bind(update.attempts.map(i64::from))
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }

        tx.commit().await.map_err(db_error)
    }

    /// Convert database row to OrderRecord
    fn row_to_order(row: &SqliteRow) -> Result<OrderRecord, StoreError> {
        let id: String = row.get("id");
        let routed_venue = row
            .get::<Option<String>, _>("routed_venue")
            .map(|v| {
                Venue::parse(&v).ok_or_else(|| {
                    StoreError::SerializationError(format!("unknown venue: {v}"))
                })
            })
            .transpose()?;
        let execution_price = row
            .get::<Option<String>, _>("execution_price")
            .map(|p| parse_column::<Decimal>(&p))
            .transpose()?;

        Ok(OrderRecord {
            id: Uuid::parse_str(&id).map_err(|e| StoreError::SerializationError(e.to_string()))?,
            order_type: parse_column(row.get::<String, _>("order_type").as_str())?,
            base_mint: row.get("base_mint"),
            quote_mint: row.get("quote_mint"),
            side: parse_column(row.get::<String, _>("side").as_str())?,
            amount: parse_column(row.get::<String, _>("amount").as_str())?,
            slippage_bps: row.get::<i64, _>("slippage_bps") as u32,
            status: parse_column(row.get::<String, _>("status").as_str())?,
            routed_venue,
            tx_hash: row.get("tx_hash"),
            execution_price,
            failure_reason: row.get("failure_reason"),
            attempts: row.get::<i64, _>("attempts") as u32,
            created_at: millis_to_datetime(row.get("created_at"))?,
            updated_at: millis_to_datetime(row.get("updated_at"))?,
        })
    }
}

#[async_trait]
impl OrderStore for SqliteOrderStore {
    async fn create_pending(&self, order: &OrderRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_type, base_mint, quote_mint, side, amount, slippage_bps,
                status, routed_venue, tx_hash, execution_price, failure_reason,
                attempts, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order.id.to_string())
        .bind(order.order_type.as_str())
        .bind(&order.base_mint)
        .bind(&order.quote_mint)
        .bind(order.side.as_str())
        .bind(order.amount.to_string())
        .bind(i64::from(order.slippage_bps))
        .bind(order.status.as_str())
        .bind(order.routed_venue.map(|v| v.as_str()))
        .bind(&order.tx_hash)
        .bind(order.execution_price.map(|p| p.to_string()))
        .bind(&order.failure_reason)
        .bind(i64::from(order.attempts))
        .bind(order.created_at.timestamp_millis())
        .bind(order.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::DuplicateId(order.id))
            }
            Err(e) => Err(db_error(e)),
        }
    }

    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<(), StoreError> {
        self.apply(
            id,
            OrderUpdate {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    async fn update_routing(&self, id: OrderId, venue: Venue) -> Result<(), StoreError> {
        self.apply(
            id,
            OrderUpdate {
                routed_venue: Some(venue),
                ..Default::default()
            },
        )
        .await
    }

    async fn update_success(
        &self,
        id: OrderId,
        tx_hash: &str,
        execution_price: Decimal,
    ) -> Result<(), StoreError> {
        self.apply(
            id,
            OrderUpdate {
                status: Some(OrderStatus::Confirmed),
                tx_hash: Some(tx_hash),
                execution_price: Some(execution_price),
                ..Default::default()
            },
        )
        .await
    }

    async fn update_failure(
        &self,
        id: OrderId,
        reason: &str,
        attempts: u32,
    ) -> Result<(), StoreError> {
        self.apply(
            id,
            OrderUpdate {
                status: Some(OrderStatus::Failed),
                failure_reason: Some(reason),
                attempts: Some(attempts),
                ..Default::default()
            },
        )
        .await
    }

    async fn get(&self, id: OrderId) -> Result<Option<OrderRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn list_by_status(
        &self,
        status: OrderStatus,
        limit: usize,
    ) -> Result<Vec<OrderRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM orders WHERE status = ? ORDER BY created_at LIMIT ?")
            .bind(status.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.iter().map(Self::row_to_order).collect()
    }

    async fn get_history(&self, id: OrderId) -> Result<Vec<StatusTransition>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT from_status, to_status, at FROM order_transitions
            WHERE order_id = ? ORDER BY id
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                Ok(StatusTransition {
                    from_status: parse_column(row.get::<String, _>("from_status").as_str())?,
                    to_status: parse_column(row.get::<String, _>("to_status").as_str())?,
                    at: millis_to_datetime(row.get("at"))?,
                })
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::DatabaseError(e.to_string())
}

fn parse_column<T>(value: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| StoreError::SerializationError(e.to_string()))
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::SerializationError(format!("timestamp out of range: {millis}")))
}
