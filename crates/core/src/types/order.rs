//! Orders and order lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CustomerId, OrderId, OrderStatus, Price, ProductId};

/// One product line of a placed order.
///
/// `unit_price` is captured when the order is placed and never re-priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Price,
    #[serde(default)]
    pub discount: Price,
}

impl OrderLine {
    /// Line total after discount, never negative.
    #[must_use]
    pub fn total(&self) -> Price {
        (self.unit_price.times(self.quantity) - self.discount).non_negative()
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion_code: Option<String>,
    pub shipping_fee: Price,
    pub total: Price,
    pub lines: Vec<OrderLine>,
}

impl Order {
    /// Units per product, merged and sorted by product ID.
    ///
    /// This is the order in which stock rows are locked and adjusted.
    #[must_use]
    pub fn quantities(&self) -> Vec<(ProductId, u32)> {
        merged_quantities(self.lines.iter().map(|l| (l.product_id, l.quantity)))
    }
}

/// Sum of line totals.
#[must_use]
pub fn subtotal(lines: &[OrderLine]) -> Price {
    lines.iter().map(OrderLine::total).sum()
}

/// Order total: subtotal plus shipping, never negative.
#[must_use]
pub fn order_total(lines: &[OrderLine], shipping_fee: Price) -> Price {
    (subtotal(lines) + shipping_fee).non_negative()
}

/// Merge per-product quantities and sort by product ID.
#[must_use]
pub fn merged_quantities(lines: impl IntoIterator<Item = (ProductId, u32)>) -> Vec<(ProductId, u32)> {
    let mut merged: Vec<(ProductId, u32)> = Vec::new();
    for (product_id, quantity) in lines {
        match merged.iter_mut().find(|(id, _)| *id == product_id) {
            Some((_, total)) => *total = total.saturating_add(quantity),
            None => merged.push((product_id, quantity)),
        }
    }
    merged.sort_by_key(|(id, _)| *id);
    merged
}

/// A requested line in a new order; the price is filled in server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Checkout request submitted by a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub customer_id: CustomerId,
    pub lines: Vec<NewOrderLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion_code: Option<String>,
}
