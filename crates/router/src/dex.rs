use async_trait::async_trait;
use order_engine_types::{Quote, RouteDecision, Venue};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{RouteError, RouteProvider, SimulatedVenue, VenueClient};

/// Routes an order by asking every venue for a quote and taking the highest
/// price.
///
/// The highest price wins for both buys and sells; the router is not told
/// the side.
pub struct DexRouter {
    venues: Vec<Arc<dyn VenueClient>>,
    route_delay: Duration,
}

impl DexRouter {
    pub fn new(venues: Vec<Arc<dyn VenueClient>>, route_delay: Duration) -> Self {
        Self {
            venues,
            route_delay,
        }
    }

    /// Raydium and Meteora, both simulated.
    pub fn simulated(route_delay: Duration, price_variation_bps: u32) -> Self {
        let venues = Venue::ALL
            .into_iter()
            .map(|venue| {
                Arc::new(SimulatedVenue::new(venue, price_variation_bps)) as Arc<dyn VenueClient>
            })
            .collect();

        Self::new(venues, route_delay)
    }

    async fn query_all_venues(
        &self,
        base_mint: &str,
        quote_mint: &str,
        amount: Decimal,
    ) -> Vec<Quote> {
        let futures: Vec<_> = self
            .venues
            .iter()
            .map(|client| client.get_quote(base_mint, quote_mint, amount))
            .collect();

        let results = futures::future::join_all(futures).await;

        results
            .into_iter()
            .zip(&self.venues)
            .filter_map(|(result, client)| match result {
                Ok(quote) => Some(quote),
                Err(e) => {
                    tracing::warn!(venue = %client.venue(), error = %e, "venue quote failed");
                    None
                }
            })
            .collect()
    }
}

/// Highest-priced quote; the first one wins a tie.
pub fn select_best_quote(quotes: &[Quote]) -> Option<&Quote> {
    quotes
        .iter()
        .reduce(|best, q| if q.price > best.price { q } else { best })
}

/// Settlement reference: `0x` followed by 32 lowercase hex digits.
pub fn generate_tx_hash() -> String {
    format!("0x{}", Uuid::new_v4().simple())
}

#[async_trait]
impl RouteProvider for DexRouter {
    async fn best_route(
        &self,
        base_mint: &str,
        quote_mint: &str,
        amount: Decimal,
    ) -> Result<RouteDecision, RouteError> {
        if amount <= Decimal::ZERO {
            return Err(RouteError::InvalidRequest(format!(
                "amount must be positive, got {amount}"
            )));
        }

        tokio::time::sleep(self.route_delay).await;

        let quotes = self.query_all_venues(base_mint, quote_mint, amount).await;
        let best = select_best_quote(&quotes)
            .cloned()
            .ok_or_else(|| RouteError::NoViableRoute {
                base: base_mint.to_string(),
                quote: quote_mint.to_string(),
            })?;

        tracing::debug!(
            base = base_mint,
            quote = quote_mint,
            venue = %best.venue,
            price = %best.price,
            candidates = quotes.len(),
            "route selected"
        );

        Ok(RouteDecision {
            venue: best.venue,
            price: best.price,
            quotes,
            tx_hash: generate_tx_hash(),
        })
    }
}
