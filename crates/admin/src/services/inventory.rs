//! Availability queries, stock checks and manual stock adjustments.

use std::time::Duration;

use mercato_core::{
    AddToCartRequest, AvailabilityResult, CartLine, ProductId, ProductStock, StockShortage,
    merged_quantities,
};
use thiserror::Error;
use tracing::instrument;

use crate::ledger::{InventoryLedger, LedgerError, StockOperation};

/// Errors from inventory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error(
        "insufficient stock for {} (product {}): {} available, {} required",
        .0.name, .0.product_id, .0.available, .0.required
    )]
    InsufficientStock(StockShortage),

    /// The request cannot be honoured right now; the message is meant for the
    /// customer.
    #[error("{0}")]
    Rejected(String),

    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

impl From<LedgerError> for InventoryError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::ProductNotFound(id) => Self::ProductNotFound(id),
            LedgerError::InsufficientStock(shortage) => Self::InsufficientStock(shortage),
            LedgerError::QuantityOutOfRange(quantity) => {
                Self::Rejected(format!("quantity {quantity} is out of range"))
            }
            other => {
                if other.is_infrastructure() {
                    tracing::error!(error = %other, "Inventory ledger failure");
                } else {
                    tracing::warn!(error = %other, "Unexpected ledger answer");
                }
                Self::Infrastructure("inventory ledger unavailable".to_string())
            }
        }
    }
}

/// Read-mostly inventory operations over the ledger.
#[derive(Debug, Clone)]
pub struct InventoryService<L> {
    ledger: L,
    timeout: Duration,
    low_stock_threshold: u32,
}

impl<L: InventoryLedger> InventoryService<L> {
    #[must_use]
    pub const fn new(ledger: L, timeout: Duration, low_stock_threshold: u32) -> Self {
        Self {
            ledger,
            timeout,
            low_stock_threshold,
        }
    }

    /// Run a ledger call under the configured timeout.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, InventoryError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(InventoryError::from),
            Err(_) => {
                tracing::error!("Inventory ledger call timed out");
                Err(InventoryError::Infrastructure(
                    "inventory ledger timed out".to_string(),
                ))
            }
        }
    }

    /// Can `quantity` units of a product be fulfilled right now?
    ///
    /// Unknown and removed products are answered, not errors.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InvalidQuantity`] for a zero quantity and
    /// [`InventoryError::Infrastructure`] if the ledger fails.
    pub async fn availability(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<AvailabilityResult, InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity);
        }

        let product = self.bounded(self.ledger.product(product_id)).await?;
        Ok(AvailabilityResult::evaluate(product.as_ref(), quantity))
    }

    /// Every line whose requested quantity exceeds current stock.
    ///
    /// Repeated product IDs are summed first. Stock is not touched.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::ProductNotFound`] if any product is unknown.
    pub async fn check_items(
        &self,
        items: &[(ProductId, u32)],
    ) -> Result<Vec<StockShortage>, InventoryError> {
        if items.iter().any(|(_, quantity)| *quantity == 0) {
            return Err(InventoryError::InvalidQuantity);
        }

        let wanted = merged_quantities(items.iter().copied());
        let ids: Vec<ProductId> = wanted.iter().map(|(id, _)| *id).collect();
        let products = self.bounded(self.ledger.products(&ids)).await?;

        let mut shortages = Vec::new();
        for (product_id, required) in wanted {
            let product = products
                .iter()
                .find(|p| p.product_id == product_id)
                .ok_or(InventoryError::ProductNotFound(product_id))?;

            if product.stock < required {
                shortages.push(StockShortage {
                    product_id,
                    name: product.name.clone(),
                    available: product.stock,
                    required,
                });
            }
        }

        Ok(shortages)
    }

    /// Products at or below `threshold` units, lowest first. Defaults to the
    /// configured threshold.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Infrastructure`] if the ledger fails.
    pub async fn low_stock(&self, threshold: Option<u32>) -> Result<Vec<ProductStock>, InventoryError> {
        let threshold = threshold.unwrap_or(self.low_stock_threshold);
        self.bounded(self.ledger.low_stock(threshold)).await
    }

    /// Manually add or remove stock.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::InsufficientStock`] when subtracting more
    /// than is in stock; stock is then unchanged.
    #[instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        product_id: ProductId,
        change: u32,
        operation: StockOperation,
    ) -> Result<ProductStock, InventoryError> {
        if change == 0 {
            return Err(InventoryError::InvalidQuantity);
        }

        self.bounded(self.ledger.adjust_stock(product_id, change, operation))
            .await
    }

    /// Validate a cart addition and return the canonical line for it.
    ///
    /// Nothing is reserved: stock is only committed when an order is
    /// confirmed.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::ProductNotFound`] if the product is unknown or removed
    /// - [`InventoryError::Rejected`] if stock cannot cover the quantity
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, product_id = %request.product_id))]
    pub async fn add_to_cart(&self, request: &AddToCartRequest) -> Result<CartLine, InventoryError> {
        if request.quantity == 0 {
            return Err(InventoryError::InvalidQuantity);
        }

        let product = self
            .bounded(self.ledger.product(request.product_id))
            .await?
            .ok_or(InventoryError::ProductNotFound(request.product_id))?;

        let availability = AvailabilityResult::evaluate(Some(&product), request.quantity);
        if !availability.available {
            return Err(InventoryError::Rejected(availability.reason_or_default()));
        }

        Ok(CartLine {
            product_id: product.product_id,
            name: product.name,
            price: product.price,
            image: product.image,
            quantity: request.quantity,
        })
    }
}
