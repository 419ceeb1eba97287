//! Backend cart notification.

use axum::{Json, Router, extract::State, routing::post};
use mercato_core::{AddToCartRequest, CartLine};
use tracing::instrument;

use crate::error::Result;
use crate::ledger::InventoryLedger;
use crate::state::AppState;

/// Build the cart router.
pub fn router<L: InventoryLedger>() -> Router<AppState<L>> {
    Router::new().route("/api/cart/add", post(add::<L>))
}

/// `POST /api/cart/add`
///
/// Answers with the canonical line for the storefront to store. 404 when the
/// product is gone, 400 with a customer-facing message when stock is short.
///
/// # Errors
///
/// See [`crate::services::InventoryService::add_to_cart`].
#[instrument(skip(state, body), fields(customer_id = %body.customer_id, product_id = %body.product_id))]
pub async fn add<L: InventoryLedger>(
    State(state): State<AppState<L>>,
    Json(body): Json<AddToCartRequest>,
) -> Result<Json<CartLine>> {
    let line = state.inventory().add_to_cart(&body).await?;
    Ok(Json(line))
}
