//! Row types read from the admin database and their domain conversions.

use chrono::{DateTime, Utc};
use mercato_core::{
    CustomerId, Order, OrderId, OrderLine, OrderStatus, Price, ProductId, ProductStock,
};

use crate::ledger::LedgerError;

#[derive(Debug, sqlx::FromRow)]
pub struct ProductRow {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub image: Option<String>,
    pub stock: i32,
}

impl TryFrom<ProductRow> for ProductStock {
    type Error = LedgerError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let stock = u32::try_from(row.stock).map_err(|_| {
            LedgerError::DataCorruption(format!(
                "product {} has negative stock {}",
                row.id, row.stock
            ))
        })?;

        Ok(Self {
            product_id: row.id,
            name: row.name,
            price: row.price,
            image: row.image,
            stock,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct OrderRow {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub promotion_code: Option<String>,
    pub shipping_fee: Price,
    pub total: Price,
}

impl OrderRow {
    /// Attach the order's lines.
    #[must_use]
    pub fn into_order(self, lines: Vec<OrderLine>) -> Order {
        Order {
            id: self.id,
            customer_id: self.customer_id,
            created_at: self.created_at,
            status: self.status,
            promotion_code: self.promotion_code,
            shipping_fee: self.shipping_fee,
            total: self.total,
            lines,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct LineRow {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Price,
    pub discount: Price,
}

impl TryFrom<LineRow> for OrderLine {
    type Error = LedgerError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                LedgerError::DataCorruption(format!(
                    "order line for product {} has quantity {}",
                    row.product_id, row.quantity
                ))
            })?;

        Ok(Self {
            product_id: row.product_id,
            quantity,
            unit_price: row.unit_price,
            discount: row.discount,
        })
    }
}

/// Convert a quantity to the database's `INTEGER`.
///
/// # Errors
///
/// Returns [`LedgerError::QuantityOutOfRange`] above `i32::MAX`.
pub fn db_quantity(quantity: u32) -> Result<i32, LedgerError> {
    i32::try_from(quantity).map_err(|_| LedgerError::QuantityOutOfRange(quantity))
}
