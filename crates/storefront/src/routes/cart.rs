//! Cart route handlers.
//!
//! The cart is stored in the session under [`session_keys::CART`]. Every
//! handler loads it, lets the engine work on it, and writes it back.

use axum::{Json, extract::State};
use mercato_core::{Cart, CartItem, CartItemState, CartLine, Price, ProductId};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::cart::{CustomerContext, UpdateOutcome, ValidationReport};
use crate::error::{Result, add_breadcrumb, set_sentry_user};
use crate::middleware::OptionalAuth;
use crate::models::session_keys;
use crate::state::AppState;

/// One cart line as shown to the customer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    #[serde(flatten)]
    pub item: CartItem,
    pub state: CartItemState,
    pub line_total: Price,
}

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub total_items: u32,
    pub total_price: Price,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart
                .items()
                .iter()
                .map(|item| CartItemView {
                    state: item.state(),
                    line_total: item.line_total(),
                    item: item.clone(),
                })
                .collect(),
            total_items: cart.total_items(),
            total_price: cart.total_price(),
        }
    }
}

/// Reconciled cart plus what reconciliation changed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartPage {
    pub cart: CartView,
    pub report: ValidationReport,
    pub notices: Vec<String>,
}

impl CartPage {
    pub(crate) fn new(cart: &Cart, report: ValidationReport) -> Self {
        Self {
            cart: CartView::from(cart),
            notices: report.notices(),
            report,
        }
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the cart from the session. A missing or unreadable cart is empty.
pub(crate) async fn load_cart(session: &Session) -> Cart {
    session
        .get::<Cart>(session_keys::CART)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Store the cart in the session.
pub(crate) async fn save_cart(
    session: &Session,
    cart: &Cart,
) -> std::result::Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CART, cart).await
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /cart` - reconcile against live stock, then show.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartPage>> {
    let mut cart = load_cart(&session).await;
    let report = state.engine().validate_cart(&mut cart).await;
    save_cart(&session, &cart).await?;

    Ok(Json(CartPage::new(&cart, report)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u32,
}

/// `GET /cart/count` - badge count, no reconciliation.
pub async fn count(session: Session) -> Json<CountResponse> {
    let cart = load_cart(&session).await;
    Json(CountResponse {
        count: cart.total_items(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddResponse {
    pub added: CartLine,
    pub cart: CartView,
}

/// `POST /cart/add`
#[instrument(skip(state, session, customer))]
pub async fn add(
    State(state): State<AppState>,
    OptionalAuth(customer): OptionalAuth,
    session: Session,
    Json(body): Json<AddRequest>,
) -> Result<Json<AddResponse>> {
    if let Some(customer) = &customer {
        set_sentry_user(&customer.id);
    }
    let ctx = CustomerContext::from(customer);

    let mut cart = load_cart(&session).await;
    let added = state
        .engine()
        .add_to_cart(&ctx, &mut cart, body.product_id, body.quantity)
        .await?;
    save_cart(&session, &cart).await?;

    add_breadcrumb(
        "cart",
        "Added item",
        Some(&[("product_id", &body.product_id.to_string())]),
    );

    Ok(Json(AddResponse {
        added,
        cart: CartView::from(&cart),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub product_id: ProductId,
    /// Zero or below removes the item.
    pub quantity: i64,
}

impl UpdateRequest {
    /// The requested quantity, with anything below one meaning "remove".
    fn quantity(&self) -> u32 {
        u32::try_from(self.quantity.max(0)).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    #[serde(flatten)]
    pub outcome: UpdateOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub cart: CartView,
}

/// `POST /cart/update`
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<UpdateRequest>,
) -> Result<Json<UpdateResponse>> {
    let mut cart = load_cart(&session).await;
    let outcome = state
        .engine()
        .update_quantity(&mut cart, body.product_id, body.quantity())
        .await?;
    save_cart(&session, &cart).await?;

    Ok(Json(UpdateResponse {
        message: outcome.message(),
        outcome,
        cart: CartView::from(&cart),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveRequest {
    pub product_id: ProductId,
}

/// `POST /cart/remove`
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RemoveRequest>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await;
    state.engine().remove_item(&mut cart, body.product_id);
    save_cart(&session, &cart).await?;

    Ok(Json(CartView::from(&cart)))
}

/// `POST /cart/clear`
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await;
    state.engine().clear_cart(&mut cart);
    save_cart(&session, &cart).await?;

    Ok(Json(CartView::from(&cart)))
}

/// `POST /cart/acknowledge` - the customer has seen the price changes.
pub async fn acknowledge(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await;
    state.engine().acknowledge_price_changes(&mut cart);
    save_cart(&session, &cart).await?;

    Ok(Json(CartView::from(&cart)))
}
