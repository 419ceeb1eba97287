//! Promotion vouchers.
//!
//! A voucher either takes money off the order subtotal or waives shipping.
//! Validity is checked against the subtotal before any discount and against
//! the time the order is placed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{OrderLine, Price};

/// What a voucher does to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum VoucherKind {
    /// `percent` off the subtotal, never more than `max_discount`.
    Percentage { percent: u32, max_discount: Price },
    /// A flat amount off the subtotal.
    Fixed { amount: Price },
    /// Shipping is waived.
    FreeShipping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub code: String,
    #[serde(flatten)]
    pub kind: VoucherKind,
    #[serde(default)]
    pub min_order_amount: Price,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

const fn active_by_default() -> bool {
    true
}

/// Why a voucher code was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromotionError {
    #[error("Promotion code {0} does not exist")]
    Unknown(String),

    #[error("Promotion code {0} is no longer active")]
    Inactive(String),

    #[error("Promotion code {0} is not valid yet")]
    NotYetValid(String),

    #[error("Promotion code {0} has expired")]
    Expired(String),

    #[error("Promotion code {code} needs an order of at least {minimum} (subtotal {subtotal})")]
    BelowMinimum {
        code: String,
        minimum: Price,
        subtotal: Price,
    },
}

/// The effect of an accepted voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppliedPromotion {
    /// Amount taken off the subtotal, never more than the subtotal.
    pub discount: Price,
    pub free_shipping: bool,
}

impl Voucher {
    /// Check the voucher against an order `subtotal` placed at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`PromotionError`] when the voucher is inactive, outside its
    /// validity window, or the subtotal is below its minimum.
    pub fn apply(&self, subtotal: Price, now: DateTime<Utc>) -> Result<AppliedPromotion, PromotionError> {
        if !self.is_active {
            return Err(PromotionError::Inactive(self.code.clone()));
        }
        if self.valid_from.is_some_and(|from| now < from) {
            return Err(PromotionError::NotYetValid(self.code.clone()));
        }
        if self.valid_to.is_some_and(|to| now > to) {
            return Err(PromotionError::Expired(self.code.clone()));
        }
        if subtotal < self.min_order_amount {
            return Err(PromotionError::BelowMinimum {
                code: self.code.clone(),
                minimum: self.min_order_amount,
                subtotal,
            });
        }

        let applied = match self.kind {
            VoucherKind::Percentage { percent, max_discount } => {
                let off = Price::new(
                    (subtotal.amount() * Decimal::from(percent) / Decimal::ONE_HUNDRED).round_dp(2),
                );
                AppliedPromotion {
                    discount: off.min(max_discount),
                    free_shipping: false,
                }
            }
            VoucherKind::Fixed { amount } => AppliedPromotion {
                discount: amount,
                free_shipping: false,
            },
            VoucherKind::FreeShipping => AppliedPromotion {
                discount: Price::ZERO,
                free_shipping: true,
            },
        };

        Ok(AppliedPromotion {
            discount: applied.discount.min(subtotal).non_negative(),
            ..applied
        })
    }
}

/// Spread an order-level `discount` over `lines`, first line first.
///
/// No line is discounted below zero, so the lines' discounts add up to
/// `discount` capped at the lines' gross value.
pub fn allocate_discount(lines: &mut [OrderLine], discount: Price) {
    let mut remaining = discount.non_negative();
    for line in lines {
        let gross = line.unit_price.times(line.quantity);
        let share = remaining.min(gross);
        line.discount = share;
        remaining = remaining - share;
    }
}
