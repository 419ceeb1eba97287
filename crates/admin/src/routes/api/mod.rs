//! JSON API route handlers for admin.
//!
//! Every route here sits behind the bearer-token guard.

pub mod cart;
pub mod inventory;
pub mod orders;

use axum::Router;

use crate::ledger::InventoryLedger;
use crate::state::AppState;

/// Build the complete API router.
pub fn router<L: InventoryLedger>() -> Router<AppState<L>> {
    Router::new()
        .merge(inventory::router())
        .merge(cart::router())
        .merge(orders::router())
}
