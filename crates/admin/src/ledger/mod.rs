//! Inventory ledger: the authoritative store of stock, prices and orders.
//!
//! Every stock mutation goes through [`InventoryLedger`]. Implementations must
//! make each call atomic: a status transition either applies its status change
//! and all of its stock adjustments, or none of them. Decrements are always a
//! single conditional "decrement if stock >= n" per product, never a read
//! followed by a write.
//!
//! Two implementations:
//! - [`PgInventoryLedger`] - `PostgreSQL`, one transaction per call
//! - [`MemoryLedger`] - in-process, with fault injection for tests

pub mod memory;
pub mod postgres;

use std::future::Future;

use mercato_core::{
    CustomerId, InventoryEffect, Order, OrderId, OrderLine, OrderStatus, Price, ProductId,
    ProductStock, StockShortage, order_total,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryLedger;
pub use postgres::PgInventoryLedger;

/// Errors raised by an inventory ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The ledger could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Data in the ledger is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// A quantity does not fit the ledger's storage type.
    #[error("quantity {0} is out of range")]
    QuantityOutOfRange(u32),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The order left `expected` before the change could be applied.
    #[error("order {order_id} is {current}, expected {expected}")]
    StatusChanged {
        order_id: OrderId,
        expected: OrderStatus,
        current: OrderStatus,
    },

    /// A conditional decrement found less stock than required.
    #[error(
        "insufficient stock for product {} ({}): available {}, required {}",
        .0.product_id, .0.name, .0.available, .0.required
    )]
    InsufficientStock(StockShortage),
}

impl LedgerError {
    /// Whether the failure is about reaching or trusting the ledger rather
    /// than about the request itself.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Unavailable(_) | Self::DataCorruption(_)
        )
    }
}

/// Direction of a manual stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockOperation {
    Add,
    Subtract,
}

impl std::str::FromStr for StockOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "subtract" => Ok(Self::Subtract),
            other => Err(format!("unknown stock operation: {other} (expected add or subtract)")),
        }
    }
}

/// An order ready to be written; the ledger assigns ID, timestamp and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub promotion_code: Option<String>,
    pub shipping_fee: Price,
    pub lines: Vec<OrderLine>,
}

impl NewOrder {
    /// Order total: lines after discount plus shipping, never negative.
    #[must_use]
    pub fn total(&self) -> Price {
        order_total(&self.lines, self.shipping_fee)
    }
}

/// Authoritative store of stock quantity, price and orders.
///
/// Implementations are cheap to clone and safe to share across tasks.
pub trait InventoryLedger: Clone + Send + Sync + 'static {
    /// Look up a product on sale. Removed products are `None`.
    fn product(
        &self,
        product_id: ProductId,
    ) -> impl Future<Output = Result<Option<ProductStock>, LedgerError>> + Send;

    /// Look up several products on sale, sorted by ID. Unknown IDs are skipped.
    fn products(
        &self,
        product_ids: &[ProductId],
    ) -> impl Future<Output = Result<Vec<ProductStock>, LedgerError>> + Send;

    /// Products on sale with `stock <= threshold`, lowest stock first.
    fn low_stock(
        &self,
        threshold: u32,
    ) -> impl Future<Output = Result<Vec<ProductStock>, LedgerError>> + Send;

    /// Add to or conditionally subtract from a product's stock.
    ///
    /// Subtracting more than is in stock fails with
    /// [`LedgerError::InsufficientStock`] and leaves stock untouched.
    fn adjust_stock(
        &self,
        product_id: ProductId,
        change: u32,
        operation: StockOperation,
    ) -> impl Future<Output = Result<ProductStock, LedgerError>> + Send;

    /// Write a new order at `Pending`. Stock is not touched.
    fn create_order(&self, order: NewOrder)
    -> impl Future<Output = Result<Order, LedgerError>> + Send;

    /// Look up an order with its lines.
    fn order(
        &self,
        order_id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, LedgerError>> + Send;

    /// Move an order from `expected` to `next` and apply `effect`, atomically.
    ///
    /// Fails with [`LedgerError::StatusChanged`] if the order is no longer in
    /// `expected`, and with [`LedgerError::InsufficientStock`] (naming the
    /// first short product in ID order) if a commit cannot be covered. On any
    /// error neither the status nor any stock level has changed.
    fn apply_transition(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        effect: InventoryEffect,
    ) -> impl Future<Output = Result<Order, LedgerError>> + Send;

    /// Cheap connectivity check for readiness probes.
    fn ping(&self) -> impl Future<Output = Result<(), LedgerError>> + Send;
}
