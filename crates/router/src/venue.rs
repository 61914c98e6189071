use async_trait::async_trait;
use order_engine_types::{Quote, Venue};
use rand::Rng;
use rust_decimal::Decimal;

use crate::{RouteError, VenueClient};

const BPS_DENOMINATOR: u32 = 10_000;

/// Reference price for an asset symbol before venue noise is applied.
pub fn base_price(base_mint: &str) -> Decimal {
    match base_mint.to_ascii_uppercase().as_str() {
        "SOL" => Decimal::from(100),
        "USDC" => Decimal::ONE,
        "BONK" => Decimal::new(2, 5),
        _ => Decimal::from(5),
    }
}

/// A venue whose prices wander up to `price_variation_bps` around the
/// reference price, with liquidity between 1x and 2x the requested amount.
pub struct SimulatedVenue {
    venue: Venue,
    price_variation_bps: u32,
}

impl SimulatedVenue {
    pub fn new(venue: Venue, price_variation_bps: u32) -> Self {
        Self {
            venue,
            price_variation_bps: price_variation_bps.min(BPS_DENOMINATOR),
        }
    }

    fn simulate(&self, base_mint: &str, amount: Decimal) -> Result<Quote, RouteError> {
        // Liquidity can reach twice the amount; refuse up front so the
        // outcome does not depend on the depth draw.
        if amount.checked_mul(Decimal::from(2)).is_none() {
            return Err(RouteError::InvalidRequest(format!(
                "amount {amount} too large to price"
            )));
        }

        let mut rng = rand::thread_rng();

        let variation = Decimal::from(rng.gen_range(0..=self.price_variation_bps))
            / Decimal::from(BPS_DENOMINATOR);
        let direction = if rng.gen_bool(0.5) {
            Decimal::ONE
        } else {
            Decimal::NEGATIVE_ONE
        };
        let price = base_price(base_mint)
            .checked_mul(Decimal::ONE + variation * direction)
            .ok_or_else(|| {
                RouteError::InvalidRequest(format!("price overflow for {base_mint}"))
            })?;

        let depth = Decimal::from(rng.gen_range(0..BPS_DENOMINATOR))
            / Decimal::from(BPS_DENOMINATOR);
        let liquidity = amount.checked_mul(Decimal::ONE + depth).ok_or_else(|| {
            RouteError::InvalidRequest(format!("amount {amount} too large to price"))
        })?;

        Ok(Quote {
            venue: self.venue,
            price: price.normalize(),
            liquidity: liquidity.normalize(),
        })
    }
}

#[async_trait]
impl VenueClient for SimulatedVenue {
    fn venue(&self) -> Venue {
        self.venue
    }

    async fn get_quote(
        &self,
        base_mint: &str,
        _quote_mint: &str,
        amount: Decimal,
    ) -> Result<Quote, RouteError> {
        self.simulate(base_mint, amount)
    }
}
