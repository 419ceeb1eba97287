//! Order placement.
//!
//! Line names and prices are re-derived from the live catalog; anything the
//! customer's cached cart claims about them is ignored. A promotion code is
//! checked against the catalog and its discount spread over the lines. The
//! order is written at `Pending` and stock is left alone until it is
//! confirmed.

use std::time::Duration;

use chrono::Utc;
use mercato_core::{
    AppliedPromotion, Order, OrderLine, PlaceOrderRequest, Price, ProductId, PromotionError,
    StockShortage, allocate_discount, merged_quantities, subtotal,
};
use thiserror::Error;
use tracing::instrument;

use super::PromotionCatalog;
use crate::ledger::{InventoryLedger, LedgerError, NewOrder};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("order has no lines")]
    EmptyOrder,

    #[error("quantity for product {0} must be at least 1")]
    InvalidQuantity(ProductId),

    #[error("product {0} is no longer available")]
    ProductUnavailable(ProductId),

    #[error(
        "Insufficient stock for {} (product {}): {} available, {} required",
        .0.name, .0.product_id, .0.available, .0.required
    )]
    InsufficientStock(StockShortage),

    #[error(transparent)]
    Promotion(#[from] PromotionError),

    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

impl From<LedgerError> for CheckoutError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::ProductNotFound(id) => Self::ProductUnavailable(id),
            LedgerError::InsufficientStock(shortage) => Self::InsufficientStock(shortage),
            other => {
                if other.is_infrastructure() {
                    tracing::error!(error = %other, "Inventory ledger failure during checkout");
                } else {
                    tracing::warn!(error = %other, "Unexpected ledger answer during checkout");
                }
                Self::Infrastructure("inventory ledger unavailable".to_string())
            }
        }
    }
}

/// Shipping charged on new orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShippingPolicy {
    pub fee: Price,
    /// Orders whose subtotal reaches this amount ship free.
    pub free_over: Option<Price>,
}

impl ShippingPolicy {
    #[must_use]
    pub const fn flat(fee: Price) -> Self {
        Self {
            fee,
            free_over: None,
        }
    }

    /// Fee for an order with `subtotal` before discounts.
    #[must_use]
    pub fn fee_for(&self, subtotal: Price) -> Price {
        match self.free_over {
            Some(threshold) if subtotal >= threshold => Price::ZERO,
            _ => self.fee,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutService<L> {
    ledger: L,
    timeout: Duration,
    shipping: ShippingPolicy,
    promotions: PromotionCatalog,
}

impl<L: InventoryLedger> CheckoutService<L> {
    #[must_use]
    pub const fn new(
        ledger: L,
        timeout: Duration,
        shipping: ShippingPolicy,
        promotions: PromotionCatalog,
    ) -> Self {
        Self {
            ledger,
            timeout,
            shipping,
            promotions,
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, CheckoutError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                tracing::error!("Inventory ledger call timed out during checkout");
                CheckoutError::Infrastructure("inventory ledger timed out".to_string())
            })?
            .map_err(CheckoutError::from)
    }

    /// Place an order at `Pending`.
    ///
    /// Repeated product IDs are merged into one line. A line is refused when
    /// its product is unknown or removed, or when current stock cannot cover
    /// it; the check does not reserve anything. A promotion code that is
    /// unknown, expired, inactive or above the order's reach refuses the
    /// whole order.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError`] describing the first problem found.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    pub async fn place_order(&self, request: PlaceOrderRequest) -> Result<Order, CheckoutError> {
        if request.lines.is_empty() {
            return Err(CheckoutError::EmptyOrder);
        }
        if let Some(line) = request.lines.iter().find(|l| l.quantity == 0) {
            return Err(CheckoutError::InvalidQuantity(line.product_id));
        }

        let wanted = merged_quantities(request.lines.iter().map(|l| (l.product_id, l.quantity)));
        let ids: Vec<ProductId> = wanted.iter().map(|(id, _)| *id).collect();
        let products = self.bounded(self.ledger.products(&ids)).await?;

        let mut lines = Vec::with_capacity(wanted.len());
        for (product_id, quantity) in wanted {
            let product = products
                .iter()
                .find(|p| p.product_id == product_id)
                .ok_or(CheckoutError::ProductUnavailable(product_id))?;

            if product.stock < quantity {
                return Err(CheckoutError::InsufficientStock(StockShortage {
                    product_id,
                    name: product.name.clone(),
                    available: product.stock,
                    required: quantity,
                }));
            }

            lines.push(OrderLine {
                product_id,
                quantity,
                unit_price: product.price,
                discount: Price::ZERO,
            });
        }

        let promotion_code = request
            .promotion_code
            .map(|code| code.trim().to_uppercase())
            .filter(|code| !code.is_empty());

        let gross = subtotal(&lines);
        let promotion = match &promotion_code {
            Some(code) => self.promotions.apply(code, gross, Utc::now()).inspect_err(|e| {
                tracing::info!(error = %e, "Promotion code refused");
            })?,
            None => AppliedPromotion::default(),
        };
        allocate_discount(&mut lines, promotion.discount);

        let shipping_fee = if promotion.free_shipping {
            Price::ZERO
        } else {
            self.shipping.fee_for(gross)
        };

        let order = self
            .bounded(self.ledger.create_order(NewOrder {
                customer_id: request.customer_id,
                promotion_code,
                shipping_fee,
                lines,
            }))
            .await?;

        tracing::info!(
            order_id = %order.id,
            discount = %promotion.discount,
            total = %order.total,
            "Order placed"
        );
        Ok(order)
    }
}
