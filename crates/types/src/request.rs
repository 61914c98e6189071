use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{OrderSide, OrderType};

/// Slippage tolerance applied when a request omits one.
pub const DEFAULT_SLIPPAGE_BPS: u32 = 250;

/// Largest accepted slippage tolerance (10%).
pub const MAX_SLIPPAGE_BPS: u32 = 1_000;

/// Raw market order submission as received over the wire.
///
/// Fields are kept loose so that every malformed value is reported through
/// [`ValidationError`] instead of a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrderRequest {
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub base_mint: String,
    #[serde(default)]
    pub quote_mint: String,
    #[serde(default)]
    pub side: String,
    pub amount: Decimal,
    #[serde(default)]
    pub slippage_bps: Option<i64>,
}

impl MarketOrderRequest {
    pub fn new(
        base_mint: impl Into<String>,
        quote_mint: impl Into<String>,
        side: OrderSide,
        amount: Decimal,
    ) -> Self {
        Self {
            order_type: Some(OrderType::Market.to_string()),
            base_mint: base_mint.into(),
            quote_mint: quote_mint.into(),
            side: side.to_string(),
            amount,
            slippage_bps: None,
        }
    }

    pub fn with_slippage_bps(mut self, slippage_bps: i64) -> Self {
        self.slippage_bps = Some(slippage_bps);
        self
    }

    /// Check every field and produce the normalized order.
    pub fn validate(&self) -> Result<MarketOrder, ValidationError> {
        let order_type = match self.order_type.as_deref() {
            None => OrderType::Market,
            Some(raw) => raw
                .parse()
                .map_err(|_| ValidationError::UnsupportedOrderType(raw.to_string()))?,
        };

        let base_mint = self.base_mint.trim();
        if base_mint.is_empty() {
            return Err(ValidationError::MissingField("baseMint"));
        }

        let quote_mint = self.quote_mint.trim();
        if quote_mint.is_empty() {
            return Err(ValidationError::MissingField("quoteMint"));
        }

        let side = self
            .side
            .parse()
            .map_err(|_| ValidationError::InvalidSide(self.side.clone()))?;

        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(self.amount));
        }

        let slippage_bps = match self.slippage_bps {
            None => DEFAULT_SLIPPAGE_BPS,
            Some(bps) if (1..=MAX_SLIPPAGE_BPS as i64).contains(&bps) => bps as u32,
            Some(bps) => return Err(ValidationError::SlippageOutOfRange(bps)),
        };

        Ok(MarketOrder {
            order_type,
            base_mint: base_mint.to_string(),
            quote_mint: quote_mint.to_string(),
            side,
            amount: self.amount,
            slippage_bps,
        })
    }
}

/// A market order that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrder {
    pub order_type: OrderType,
    pub base_mint: String,
    pub quote_mint: String,
    pub side: OrderSide,
    pub amount: Decimal,
    pub slippage_bps: u32,
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("unsupported order type: {0}, only market orders are accepted")]
    UnsupportedOrderType(String),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("side must be buy or sell, got {0:?}")]
    InvalidSide(String),

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("slippageBps must be between 1 and {max}, got {0}", max = MAX_SLIPPAGE_BPS)]
    SlippageOutOfRange(i64),
}
