//! Promotion catalog.
//!
//! Vouchers are loaded once at startup from a JSON file (an array of
//! [`Voucher`] records) and looked up by code, ignoring case.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use mercato_core::{AppliedPromotion, Price, PromotionError, Voucher};

#[derive(Debug, Clone, Default)]
pub struct PromotionCatalog {
    vouchers: HashMap<String, Voucher>,
}

impl PromotionCatalog {
    #[must_use]
    pub fn new(vouchers: impl IntoIterator<Item = Voucher>) -> Self {
        Self {
            vouchers: vouchers
                .into_iter()
                .map(|voucher| (normalize(&voucher.code), voucher))
                .collect(),
        }
    }

    /// Parse a JSON array of vouchers.
    ///
    /// # Errors
    ///
    /// Returns the parse error if the document is not a voucher array.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let vouchers: Vec<Voucher> = serde_json::from_str(json)?;
        Ok(Self::new(vouchers))
    }

    /// Read and parse a voucher file.
    ///
    /// # Errors
    ///
    /// Returns a message naming the file if it cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, String> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        Self::from_json(&json).map_err(|e| format!("cannot parse {}: {e}", path.display()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vouchers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vouchers.is_empty()
    }

    /// Apply `code` to an order with `subtotal` placed at `now`.
    ///
    /// # Errors
    ///
    /// Returns `PromotionError::Unknown` for a code not in the catalog, or the
    /// voucher's own refusal.
    pub fn apply(
        &self,
        code: &str,
        subtotal: Price,
        now: DateTime<Utc>,
    ) -> Result<AppliedPromotion, PromotionError> {
        self.vouchers
            .get(&normalize(code))
            .ok_or_else(|| PromotionError::Unknown(code.to_string()))?
            .apply(subtotal, now)
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mercato_core::VoucherKind;

    use super::*;

    const CATALOG: &str = r#"[
        {"code": "SAVE20", "type": "percentage", "percent": 20, "maxDiscount": 100, "minOrderAmount": 200},
        {"code": "FLAT50", "type": "fixed", "amount": 50, "minOrderAmount": 150},
        {"code": "FREESHIP", "type": "free_shipping", "minOrderAmount": 100},
        {"code": "OLD", "type": "fixed", "amount": 5, "validTo": "2020-01-01T00:00:00Z"}
    ]"#;

    #[test]
    fn test_catalog_parses_and_applies() {
        let catalog = PromotionCatalog::from_json(CATALOG).unwrap();
        let now = Utc::now();
        assert_eq!(catalog.len(), 4);

        let applied = catalog.apply("save20", Price::from_units(300), now).unwrap();
        assert_eq!(applied.discount, Price::from_units(60));

        let applied = catalog.apply(" FLAT50 ", Price::from_units(150), now).unwrap();
        assert_eq!(applied.discount, Price::from_units(50));

        assert!(catalog.apply("FREESHIP", Price::from_units(100), now).unwrap().free_shipping);
    }

    #[test]
    fn test_catalog_refusals() {
        let catalog = PromotionCatalog::from_json(CATALOG).unwrap();
        let now = Utc::now();

        assert_eq!(
            catalog.apply("NOPE", Price::from_units(500), now),
            Err(PromotionError::Unknown("NOPE".to_string()))
        );
        assert_eq!(
            catalog.apply("OLD", Price::from_units(500), now),
            Err(PromotionError::Expired("OLD".to_string()))
        );
        assert!(matches!(
            catalog.apply("FLAT50", Price::from_units(149), now),
            Err(PromotionError::BelowMinimum { .. })
        ));
    }

    #[test]
    fn test_malformed_file_and_code_case() {
        assert!(PromotionCatalog::from_json(r#"[{"code": "X", "type": "bogus"}]"#).is_err());
        assert!(PromotionCatalog::new([Voucher {
            code: "x".to_string(),
            kind: VoucherKind::FreeShipping,
            min_order_amount: Price::ZERO,
            valid_from: None,
            valid_to: None,
            is_active: true,
        }])
        .apply("X", Price::ZERO, Utc::now())
        .is_ok());
    }
}
