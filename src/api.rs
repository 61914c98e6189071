//! REST API handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use order_engine_store::{OrderRecord, StatusTransition};
use order_engine_types::{MarketOrderRequest, OrderId};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{ApiError, AppState};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub order_id: OrderId,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: OrderRecord,
    pub history: Vec<StatusTransition>,
}

/// `POST /api/orders/execute`
pub async fn execute_order(
    State(state): State<AppState>,
    body: Result<Json<MarketOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(request) = body.map_err(|rejection| {
        state.metrics.record_order_rejected();
        ApiError::BadRequest(rejection.body_text())
    })?;

    let order_id = state.service.submit_market_order(&request).await?;
    info!(%order_id, "order submitted over http");

    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { order_id })))
}

/// `GET /api/orders/:id`
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest(format!("invalid order id {id:?}")))?;

    let order = state
        .service
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order {order_id} not found")))?;
    let history = state.service.order_history(order_id).await?;

    Ok(Json(OrderResponse { order, history }))
}
