use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Liquidity venues the router can execute against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Raydium,
    Meteora,
}

impl Venue {
    pub const ALL: [Venue; 2] = [Venue::Raydium, Venue::Meteora];

    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Raydium => "raydium",
            Venue::Meteora => "meteora",
        }
    }

    pub fn parse(s: &str) -> Option<Venue> {
        Venue::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single venue's price for the requested pair and size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub venue: Venue,
    pub price: Decimal,
    pub liquidity: Decimal,
}

/// Outcome of routing: the chosen venue, its price, every quote that was
/// considered, and the settlement reference for the execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDecision {
    pub venue: Venue,
    pub price: Decimal,
    pub quotes: Vec<Quote>,
    pub tx_hash: String,
}
