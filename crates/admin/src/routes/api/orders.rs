//! Order API handlers: placement, lookup and status transitions.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use mercato_core::{Order, OrderId, OrderStatus, PlaceOrderRequest};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result, transition_status};
use crate::ledger::InventoryLedger;
use crate::services::{StatusAction, TransitionResponse};
use crate::state::AppState;

/// Build the orders router.
pub fn router<L: InventoryLedger>() -> Router<AppState<L>> {
    Router::new()
        .route("/api/orders", post(place::<L>))
        .route("/api/orders/{id}", get(show::<L>))
        .route("/api/orders/{id}/actions", get(actions::<L>))
        .route("/api/orders/{id}/status", put(transition::<L>))
}

/// `POST /api/orders`
///
/// # Errors
///
/// Returns an error if the order is empty, names unavailable products, or
/// cannot be covered by current stock.
#[instrument(skip(state, body), fields(customer_id = %body.customer_id))]
pub async fn place<L: InventoryLedger>(
    State(state): State<AppState<L>>,
    Json(body): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = state.checkout().place_order(body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /api/orders/{id}`
///
/// # Errors
///
/// Returns 404 for unknown orders.
#[instrument(skip(state))]
pub async fn show<L: InventoryLedger>(
    State(state): State<AppState<L>>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().order(order_id).await?))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub actions: Vec<StatusAction>,
}

/// `GET /api/orders/{id}/actions` - the buttons staff screens should offer.
///
/// # Errors
///
/// Returns 404 for unknown orders.
#[instrument(skip(state))]
pub async fn actions<L: InventoryLedger>(
    State(state): State<AppState<L>>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<ActionsResponse>> {
    let order = state.orders().order(order_id).await?;
    Ok(Json(ActionsResponse {
        order_id,
        status: order.status,
        actions: crate::services::available_actions(order.status),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    /// Optional echo of the path ID; must match when present.
    pub order_id: Option<OrderId>,
    pub requested_status: OrderStatus,
}

/// `PUT /api/orders/{id}/status`
///
/// Always answers with a [`TransitionResponse`]; failures carry
/// `success: false` and a status code matching the failure kind.
///
/// # Errors
///
/// Returns 400 if the body's order ID disagrees with the path.
#[instrument(skip(state))]
pub async fn transition<L: InventoryLedger>(
    State(state): State<AppState<L>>,
    Path(order_id): Path<OrderId>,
    Json(body): Json<TransitionRequest>,
) -> Result<(StatusCode, Json<TransitionResponse>)> {
    if body.order_id.is_some_and(|id| id != order_id) {
        return Err(AppError::BadRequest(
            "order ID in body does not match path".to_string(),
        ));
    }

    let result = state
        .orders()
        .transition(order_id, body.requested_status)
        .await;

    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(err) => transition_status(err),
    };

    Ok((status, Json(TransitionResponse::from_result(order_id, &result))))
}
