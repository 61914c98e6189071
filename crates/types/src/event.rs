use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderId, OrderStatus, Quote, Venue};

/// Acknowledgement text sent to an observer when its subscription registers.
pub const SUBSCRIBED_MESSAGE: &str = "WebSocket subscription registered";

/// Stage-specific payload carried by a status event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventDetail {
    #[serde(rename_all = "camelCase")]
    Routed { venue: Venue, quotes: Vec<Quote> },

    #[serde(rename_all = "camelCase")]
    Confirmed {
        tx_hash: String,
        execution_price: Decimal,
        venue: Venue,
    },

    #[serde(rename_all = "camelCase")]
    Submitted { tx_hash: String },

    Failed { reason: String, attempts: u32 },

    Subscribed { message: String },
}

impl EventDetail {
    pub fn subscribed() -> Self {
        EventDetail::Subscribed {
            message: SUBSCRIBED_MESSAGE.to_string(),
        }
    }
}

/// The envelope delivered to every observer of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<EventDetail>,
    pub timestamp: DateTime<Utc>,
}

impl OrderEvent {
    pub fn new(order_id: OrderId, status: OrderStatus, detail: Option<EventDetail>) -> Self {
        Self {
            order_id,
            status,
            detail,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_envelope_shape() {
        let id = Uuid::new_v4();
        let event = OrderEvent::new(
            id,
            OrderStatus::Submitted,
            Some(EventDetail::Submitted {
                tx_hash: "0xabc".to_string(),
            }),
        );

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["orderId"], json!(id.to_string()));
        assert_eq!(value["status"], json!("submitted"));
        assert_eq!(value["detail"], json!({ "txHash": "0xabc" }));
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_detail_omitted_when_absent() {
        let event = OrderEvent::new(Uuid::new_v4(), OrderStatus::Routing, None);
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("detail").is_none());
    }

    #[test]
    fn test_confirmed_detail_survives_parse() {
        let detail = EventDetail::Confirmed {
            tx_hash: "0x01".to_string(),
            execution_price: Decimal::new(10125, 2),
            venue: Venue::Meteora,
        };

        let text = serde_json::to_string(&detail).unwrap();
        assert!(text.contains("\"executionPrice\""));
        let parsed: EventDetail = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, detail);
    }

    #[test]
    fn test_failed_detail_fields() {
        let value = serde_json::to_value(EventDetail::Failed {
            reason: "route provider unavailable".to_string(),
            attempts: 3,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({ "reason": "route provider unavailable", "attempts": 3 })
        );
    }
}
