use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MarketOrder, OrderId, OrderSide};

/// Routing inputs snapshotted when an order is enqueued.
///
/// The order id doubles as the scheduler's deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderJob {
    pub order_id: OrderId,
    pub base_mint: String,
    pub quote_mint: String,
    pub side: OrderSide,
    pub amount: Decimal,
    pub slippage_bps: u32,
}

impl OrderJob {
    pub fn from_order(order_id: OrderId, order: &MarketOrder) -> Self {
        Self {
            order_id,
            base_mint: order.base_mint.clone(),
            quote_mint: order.quote_mint.clone(),
            side: order.side,
            amount: order.amount,
            slippage_bps: order.slippage_bps,
        }
    }
}
