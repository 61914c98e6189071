use async_trait::async_trait;
use order_engine_types::{Quote, RouteDecision, Venue};
use rust_decimal::Decimal;

use crate::RouteError;

/// Picks where an order executes.
///
/// Implementations may be slow and may fail; callers treat any error as a
/// failed execution attempt.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn best_route(
        &self,
        base_mint: &str,
        quote_mint: &str,
        amount: Decimal,
    ) -> Result<RouteDecision, RouteError>;
}

/// A single venue able to price a swap
#[async_trait]
pub trait VenueClient: Send + Sync {
    fn venue(&self) -> Venue;

    async fn get_quote(
        &self,
        base_mint: &str,
        quote_mint: &str,
        amount: Decimal,
    ) -> Result<Quote, RouteError>;
}
