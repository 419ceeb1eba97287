//! Inventory commands run directly against the admin ledger.
//!
//! # Usage
//!
//! ```bash
//! # Products at or below 10 units
//! mercato-cli inventory low-stock --threshold 10
//!
//! # Receive a delivery of 24 units
//! mercato-cli inventory adjust --product 7 --change 24 --operation add
//! ```
//!
//! # Environment Variables
//!
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string for admin (falls
//!   back to `DATABASE_URL`)

use std::time::Duration;

use mercato_admin::db::create_pool;
use mercato_admin::ledger::{PgInventoryLedger, StockOperation};
use mercato_admin::services::{InventoryError, InventoryService};
use mercato_core::ProductId;
use thiserror::Error;

use super::database_url;

/// Ledger calls from the CLI get more slack than request handlers.
const CLI_LEDGER_TIMEOUT: Duration = Duration::from_secs(30);

/// Threshold when none is given.
const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 10;

#[derive(Debug, Error)]
pub enum InventoryCommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

async fn service() -> Result<InventoryService<PgInventoryLedger>, InventoryCommandError> {
    let url = database_url("ADMIN_DATABASE_URL")
        .ok_or(InventoryCommandError::MissingEnvVar("ADMIN_DATABASE_URL"))?;
    let pool = create_pool(&url).await?;

    Ok(InventoryService::new(
        PgInventoryLedger::new(pool),
        CLI_LEDGER_TIMEOUT,
        DEFAULT_LOW_STOCK_THRESHOLD,
    ))
}

/// Print every product at or below `threshold` units.
///
/// # Errors
///
/// Returns an error if the ledger cannot be reached.
pub async fn low_stock(threshold: Option<u32>) -> Result<(), InventoryCommandError> {
    let products = service().await?.low_stock(threshold).await?;

    #[allow(clippy::print_stdout)]
    {
        if products.is_empty() {
            println!("No products at or below the threshold.");
        }
        for product in &products {
            println!(
                "{:>8}  {:>6}  {}",
                product.product_id, product.stock, product.name
            );
        }
    }

    Ok(())
}

/// Add or remove stock for one product.
///
/// # Errors
///
/// Returns an error if the product is unknown, a subtraction exceeds the
/// stock on hand, or the ledger cannot be reached.
pub async fn adjust(
    product_id: ProductId,
    change: u32,
    operation: StockOperation,
) -> Result<(), InventoryCommandError> {
    let product = service()
        .await?
        .adjust_stock(product_id, change, operation)
        .await?;

    tracing::info!(
        %product_id,
        change,
        ?operation,
        stock = product.stock,
        "Stock adjusted"
    );

    #[allow(clippy::print_stdout)]
    {
        println!("{} now has {} in stock", product.name, product.stock);
    }

    Ok(())
}
