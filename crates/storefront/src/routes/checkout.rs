//! Checkout handlers.
//!
//! Both handlers reconcile the cart first. An order is only placed when
//! reconciliation changed nothing the customer has not already seen.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mercato_core::Order;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use super::cart::{CartPage, load_cart, save_cart};
use crate::cart::{CustomerContext, ValidationReport};
use crate::error::Result;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPage {
    #[serde(flatten)]
    pub page: CartPage,
    /// True when the order can be placed as shown.
    pub ready: bool,
}

fn is_ready(cart_is_empty: bool, report: &ValidationReport) -> bool {
    !cart_is_empty && report.is_clean() && report.price_changed.is_empty()
}

/// `GET /checkout`
#[instrument(skip(state, session, customer))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    session: Session,
) -> Result<Json<CheckoutPage>> {
    let mut cart = load_cart(&session).await;
    let report = state.engine().validate_cart(&mut cart).await;
    save_cart(&session, &cart).await?;
    tracing::debug!(customer_id = %customer.id, items = cart.len(), "Checkout reviewed");

    let ready = is_ready(cart.is_empty(), &report);
    Ok(Json(CheckoutPage {
        page: CartPage::new(&cart, report),
        ready,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderForm {
    #[serde(default)]
    pub promotion_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlaced {
    pub order: Order,
}

/// `POST /checkout`
///
/// Returns 201 with the order, or 409 with the reconciled cart when items
/// were removed, resized, or repriced since the customer last looked.
#[instrument(skip(state, session, customer, form))]
pub async fn place(
    State(state): State<AppState>,
    OptionalAuth(customer): OptionalAuth,
    session: Session,
    Json(form): Json<PlaceOrderForm>,
) -> Result<Response> {
    let ctx = CustomerContext::from(customer);
    ctx.require()?;

    let mut cart = load_cart(&session).await;
    let report = state.engine().validate_cart(&mut cart).await;
    save_cart(&session, &cart).await?;

    if !cart.is_empty() && !is_ready(false, &report) {
        tracing::info!(
            removed = report.removed.len(),
            clamped = report.clamped.len(),
            "Checkout held back for cart changes"
        );
        let page = CheckoutPage {
            page: CartPage::new(&cart, report),
            ready: false,
        };
        return Ok((StatusCode::CONFLICT, Json(page)).into_response());
    }

    let order = state
        .engine()
        .place_order(&ctx, &mut cart, form.promotion_code)
        .await?;
    save_cart(&session, &cart).await?;

    Ok((StatusCode::CREATED, Json(OrderPlaced { order })).into_response())
}
