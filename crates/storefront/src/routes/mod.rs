//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (pings the back office)
//!
//! # Cart (session-backed JSON)
//! GET  /cart                   - Reconciled cart with notices
//! GET  /cart/count             - Item count badge
//! POST /cart/add               - Add to cart (signed-in customers)
//! POST /cart/update            - Change quantity (clamped to stock)
//! POST /cart/remove            - Remove item
//! POST /cart/clear             - Empty the cart
//! POST /cart/acknowledge       - Dismiss price-change warnings
//!
//! # Checkout
//! GET  /checkout               - Reconciled cart and readiness
//! POST /checkout               - Place the order
//!
//! # Auth
//! POST /auth/logout            - Forget the customer
//! ```
//!
//! The session layer is added by the caller so tests can swap the store.

pub mod auth;
pub mod cart;
pub mod checkout;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/acknowledge", post(cart::acknowledge))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/cart", cart_routes())
        .route("/checkout", get(checkout::show).post(checkout::place))
        .route("/auth/logout", post(auth::logout))
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the back office is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.backend().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
