//! Inventory API handlers: availability oracle, stock checks, adjustments.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, put},
};
use mercato_core::{AvailabilityResult, ProductId, ProductStock, StockShortage};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::ledger::{InventoryLedger, StockOperation};
use crate::state::AppState;

/// Build the inventory router.
pub fn router<L: InventoryLedger>() -> Router<AppState<L>> {
    Router::new()
        .route("/api/inventory/availability", get(availability::<L>))
        .route("/api/inventory/check", get(check::<L>))
        .route("/api/inventory/low-stock", get(low_stock::<L>))
        .route("/api/inventory/stock", put(adjust_stock::<L>))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

/// `GET /api/inventory/availability?product_id=&quantity=`
///
/// # Errors
///
/// Returns an error for a zero quantity or if the ledger is unreachable.
#[instrument(skip(state))]
pub async fn availability<L: InventoryLedger>(
    State(state): State<AppState<L>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResult>> {
    let result = state
        .inventory()
        .availability(query.product_id, query.quantity)
        .await?;
    Ok(Json(result))
}

/// Comma-separated parallel lists, e.g. `product_ids=1,2&quantities=5,1`.
#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    pub product_ids: String,
    pub quantities: String,
}

impl CheckQuery {
    fn items(&self) -> std::result::Result<Vec<(ProductId, u32)>, AppError> {
        let ids = split_list::<ProductId>(&self.product_ids, "product_ids")?;
        let quantities = split_list::<u32>(&self.quantities, "quantities")?;

        if ids.is_empty() || ids.len() != quantities.len() {
            return Err(AppError::BadRequest(
                "product_ids and quantities must be non-empty and the same length".to_string(),
            ));
        }

        Ok(ids.into_iter().zip(quantities).collect())
    }
}

fn split_list<T: std::str::FromStr>(
    raw: &str,
    name: &str,
) -> std::result::Result<Vec<T>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| AppError::BadRequest(format!("invalid value in {name}: {s}")))
        })
        .collect()
}

/// One line that current stock cannot cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortageView {
    pub product_id: ProductId,
    pub name: String,
    pub available: u32,
    pub required: u32,
    pub shortage: u32,
}

impl From<StockShortage> for ShortageView {
    fn from(s: StockShortage) -> Self {
        Self {
            shortage: s.shortage(),
            product_id: s.product_id,
            name: s.name,
            available: s.available,
            required: s.required,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    /// True when every line is covered.
    pub ok: bool,
    pub shortages: Vec<ShortageView>,
}

/// `GET /api/inventory/check?product_ids=&quantities=`
///
/// # Errors
///
/// Returns an error for malformed lists or unknown products.
#[instrument(skip(state))]
pub async fn check<L: InventoryLedger>(
    State(state): State<AppState<L>>,
    Query(query): Query<CheckQuery>,
) -> Result<Json<CheckResponse>> {
    let items = query.items()?;
    let shortages = state.inventory().check_items(&items).await?;

    Ok(Json(CheckResponse {
        ok: shortages.is_empty(),
        shortages: shortages.into_iter().map(ShortageView::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LowStockResponse {
    pub threshold: u32,
    pub products: Vec<ProductStock>,
}

/// `GET /api/inventory/low-stock?threshold=`
///
/// # Errors
///
/// Returns an error if the ledger is unreachable.
#[instrument(skip(state))]
pub async fn low_stock<L: InventoryLedger>(
    State(state): State<AppState<L>>,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<LowStockResponse>> {
    let threshold = query
        .threshold
        .unwrap_or(state.config().low_stock_threshold);
    let products = state.inventory().low_stock(Some(threshold)).await?;
    Ok(Json(LowStockResponse {
        threshold,
        products,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockRequest {
    pub product_id: ProductId,
    pub change: u32,
    pub operation: StockOperation,
}

/// `PUT /api/inventory/stock`
///
/// # Errors
///
/// Returns 409 when subtracting more than is in stock.
#[instrument(skip(state))]
pub async fn adjust_stock<L: InventoryLedger>(
    State(state): State<AppState<L>>,
    Json(body): Json<AdjustStockRequest>,
) -> Result<Json<ProductStock>> {
    let product = state
        .inventory()
        .adjust_stock(body.product_id, body.change, body.operation)
        .await?;
    Ok(Json(product))
}
