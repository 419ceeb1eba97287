//! Mercato CLI - Database migrations and inventory tools.
//!
//! # Usage
//!
//! ```bash
//! # Run all database migrations
//! mercato-cli migrate all
//!
//! # List products running low
//! mercato-cli inventory low-stock --threshold 5
//!
//! # Correct a miscount
//! mercato-cli inventory adjust --product 7 --change 2 --operation subtract
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `inventory low-stock` - Report products at or below a stock threshold
//! - `inventory adjust` - Add or subtract stock for one product

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use mercato_admin::ledger::StockOperation;
use mercato_core::ProductId;

mod commands;

#[derive(Parser)]
#[command(name = "mercato-cli")]
#[command(author, version, about = "Mercato CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        target: MigrateTarget,
    },
    /// Inspect and correct stock
    Inventory {
        #[command(subcommand)]
        action: InventoryAction,
    },
}

#[derive(Subcommand)]
enum MigrateTarget {
    /// Run storefront database migrations
    Storefront,
    /// Run admin database migrations
    Admin,
    /// Run all database migrations
    All,
}

#[derive(Subcommand)]
enum InventoryAction {
    /// List products at or below a stock threshold
    LowStock {
        /// Stock level to report at or below (default 10)
        #[arg(short, long)]
        threshold: Option<u32>,
    },
    /// Add or subtract stock for a product
    Adjust {
        /// Product ID
        #[arg(short, long)]
        product: ProductId,

        /// Units to add or subtract
        #[arg(short, long)]
        change: u32,

        /// `add` or `subtract`
        #[arg(short, long)]
        operation: StockOperation,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate { target } => match target {
            MigrateTarget::Storefront => commands::migrate::storefront().await?,
            MigrateTarget::Admin => commands::migrate::admin().await?,
            MigrateTarget::All => {
                commands::migrate::storefront().await?;
                commands::migrate::admin().await?;
            }
        },
        Commands::Inventory { action } => match action {
            InventoryAction::LowStock { threshold } => {
                commands::inventory::low_stock(threshold).await?;
            }
            InventoryAction::Adjust {
                product,
                change,
                operation,
            } => commands::inventory::adjust(product, change, operation).await?,
        },
    }
    Ok(())
}
