//! WebSocket status streaming

use std::borrow::Cow;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use order_engine_stream::OutboundFrame;
use order_engine_types::OrderId;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{ApiError, AppState};

/// Sent when the upgrade request does not name a valid order id.
pub const MISSING_ORDER_ID: &str = "orderId query param (uuid) is required before streaming";

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
}

/// `GET /api/orders/execute`
///
/// Upgrades to a WebSocket streaming the events of `?orderId=`. Requests
/// without an upgrade get a 400 JSON error.
pub async fn ws_handler(
    ws: Option<WebSocketUpgrade>,
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Response {
    let Some(ws) = ws else {
        return ApiError::UpgradeRequired.into_response();
    };

    let order_id = match query
        .order_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw).ok())
    {
        Some(order_id) => order_id,
        None => return ws.on_upgrade(|socket| reject(socket, MISSING_ORDER_ID.to_string())),
    };

    match state.service.get_order(order_id).await {
        Ok(Some(_)) => ws.on_upgrade(move |socket| stream_order(socket, state, order_id)),
        Ok(None) => {
            let reason = format!("order {order_id} not found");
            ws.on_upgrade(move |socket| reject(socket, reason))
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Send one error frame and close with a policy violation.
async fn reject(mut socket: WebSocket, reason: String) {
    debug!(%reason, "rejecting status stream");

    let frame = json!({ "status": "failed", "error": reason }).to_string();
    if socket.send(Message::Text(frame)).await.is_err() {
        return;
    }

    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: Cow::Owned(reason),
        })))
        .await;
}

async fn stream_order(socket: WebSocket, state: AppState, order_id: OrderId) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = state.stream.channel();

    let subscription = match state.stream.subscribe(order_id, tx) {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(%order_id, error = %e, "subscription failed");
            return;
        }
    };
    state.sync_observer_gauge();
    info!(%order_id, listener_id = subscription.listener_id(), "status stream opened");

    let forward = async move {
        while let Some(frame) = rx.recv().await {
            let message = match frame {
                OutboundFrame::Event(event) => match serde_json::to_string(&*event) {
                    Ok(json) => Message::Text(json),
                    Err(e) => {
                        error!(%order_id, error = %e, "failed to serialize event");
                        continue;
                    }
                },
                OutboundFrame::Ping => Message::Ping(Vec::new()),
            };

            if sender.send(message).await.is_err() {
                break;
            }
        }
    };

    // Client frames are ignored; only close and errors matter.
    let watch_close = async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(%order_id, error = %e, "websocket error");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = forward => {}
        _ = watch_close => {}
    }

    drop(subscription);
    state.sync_observer_gauge();
    info!(%order_id, "status stream closed");
}
