//! Stock availability answers and shortages.

use serde::{Deserialize, Serialize};

use crate::{Price, ProductId};

/// Catalog and stock facts for one product, as held by the inventory ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStock {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image: Option<String>,
    pub stock: u32,
}

/// Answer to "can `quantity` units of this product be fulfilled right now?".
///
/// Transient: produced per query and never cached beyond the caller's
/// immediate use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResult {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stock: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_image: Option<String>,
}

impl AvailabilityResult {
    /// Evaluate a request against the ledger's view of a product.
    ///
    /// `None` means the product does not exist (or was removed from sale).
    #[must_use]
    pub fn evaluate(product: Option<&ProductStock>, requested: u32) -> Self {
        let Some(product) = product else {
            return Self::missing();
        };

        let reason = if product.stock == 0 {
            Some("Out of stock".to_string())
        } else if product.stock < requested {
            Some(format!("Only {} left in stock", product.stock))
        } else {
            None
        };

        Self {
            available: reason.is_none(),
            reason,
            current_stock: Some(product.stock),
            current_price: Some(product.price),
            current_name: Some(product.name.clone()),
            current_image: product.image.clone(),
        }
    }

    /// Result for a product that no longer exists.
    #[must_use]
    pub fn missing() -> Self {
        Self {
            available: false,
            reason: Some("Product no longer exists".to_string()),
            current_stock: None,
            current_price: None,
            current_name: None,
            current_image: None,
        }
    }

    /// The product is gone for good: removed, or no stock at all.
    #[must_use]
    pub fn is_gone(&self) -> bool {
        !self.available && self.current_stock.is_none_or(|stock| stock == 0)
    }

    /// Stock left when the request exceeds it but some remains.
    #[must_use]
    pub fn limited_to(&self) -> Option<u32> {
        match self.current_stock {
            Some(stock) if !self.available && stock > 0 => Some(stock),
            _ => None,
        }
    }

    /// Human readable reason, with a fallback when the oracle gave none.
    #[must_use]
    pub fn reason_or_default(&self) -> String {
        self.reason
            .clone()
            .unwrap_or_else(|| "Product is unavailable".to_string())
    }
}

/// A line whose requested quantity exceeds current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockShortage {
    pub product_id: ProductId,
    pub name: String,
    pub available: u32,
    pub required: u32,
}

impl StockShortage {
    /// Units missing to fulfil the line.
    #[must_use]
    pub const fn shortage(&self) -> u32 {
        self.required.saturating_sub(self.available)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(stock: u32) -> ProductStock {
        ProductStock {
            product_id: ProductId::new(7),
            name: "Ceramic mug".to_string(),
            price: Price::from_units(100),
            image: Some("/img/mug.jpg".to_string()),
            stock,
        }
    }

    #[test]
    fn test_enough_stock_is_available() {
        let result = AvailabilityResult::evaluate(Some(&product(10)), 2);
        assert!(result.available);
        assert_eq!(result.current_stock, Some(10));
        assert_eq!(result.current_price, Some(Price::from_units(100)));
        assert!(result.reason.is_none());
        assert!(!result.is_gone());
        assert_eq!(result.limited_to(), None);
    }

    #[test]
    fn test_partial_stock_is_limited() {
        let result = AvailabilityResult::evaluate(Some(&product(3)), 5);
        assert!(!result.available);
        assert_eq!(result.limited_to(), Some(3));
        assert!(!result.is_gone());
        assert_eq!(result.reason.as_deref(), Some("Only 3 left in stock"));
    }

    #[test]
    fn test_zero_stock_is_gone() {
        let result = AvailabilityResult::evaluate(Some(&product(0)), 1);
        assert!(result.is_gone());
        assert_eq!(result.limited_to(), None);
    }

    #[test]
    fn test_missing_product_is_gone() {
        let result = AvailabilityResult::evaluate(None, 1);
        assert!(result.is_gone());
        assert_eq!(result.reason_or_default(), "Product no longer exists");
    }

    #[test]
    fn test_wire_shape_uses_camel_case() {
        let result = AvailabilityResult::evaluate(Some(&product(3)), 5);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["available"], false);
        assert_eq!(json["currentStock"], 3);
        assert_eq!(json["currentName"], "Ceramic mug");
    }

    #[test]
    fn test_shortage() {
        let shortage = StockShortage {
            product_id: ProductId::new(7),
            name: "Ceramic mug".to_string(),
            available: 3,
            required: 5,
        };
        assert_eq!(shortage.shortage(), 2);
    }
}
