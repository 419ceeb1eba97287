//! Cart error types.

use mercato_core::ProductId;
use thiserror::Error;

use crate::backend::BackendError;

/// Errors surfaced by the cart engine.
///
/// Messages are shown to customers as-is, so they stay free of transport
/// detail except for `Infrastructure`, which is never rendered verbatim.
#[derive(Debug, Error)]
pub enum CartError {
    /// No customer identity in the session.
    #[error("Please sign in to add items to your cart")]
    Unauthenticated,

    /// The back office refused the change; carries its message.
    #[error("{0}")]
    BackendRejected(String),

    /// The product no longer exists or was removed from sale.
    #[error("{0}")]
    ProductUnavailable(String),

    /// Order placement found a line that stock cannot cover.
    #[error("{0}")]
    InsufficientStock(String),

    /// The promotion code was unknown, expired, or not valid for this order.
    #[error("{0}")]
    PromotionRejected(String),

    /// The product is not in this cart.
    #[error("Product {0} is not in your cart")]
    NotInCart(ProductId),

    /// Quantity must be at least 1.
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    /// Nothing to check out.
    #[error("Your cart is empty")]
    EmptyCart,

    /// Back office unreachable, timed out, or answered with a server error.
    #[error("Infrastructure failure: {0}")]
    Infrastructure(String),
}

impl CartError {
    /// Classify a failed cart addition.
    pub(crate) fn from_add(err: BackendError) -> Self {
        match err {
            BackendError::Api {
                status: 404,
                message,
            } => Self::ProductUnavailable(message),
            BackendError::Api { status, message } if (400..500).contains(&status) => {
                Self::BackendRejected(message)
            }
            other => Self::Infrastructure(other.to_string()),
        }
    }

    /// Classify a failed order placement.
    pub(crate) fn from_checkout(err: BackendError) -> Self {
        match err {
            BackendError::Api {
                status: 409,
                message,
            } => Self::InsufficientStock(message),
            BackendError::Api {
                status: 404,
                message,
            } => Self::ProductUnavailable(message),
            BackendError::Api {
                status: 422,
                message,
            } => Self::PromotionRejected(message),
            BackendError::Api { status, message } if (400..500).contains(&status) => {
                Self::BackendRejected(message)
            }
            other => Self::Infrastructure(other.to_string()),
        }
    }

    /// Stable machine-readable name for the failure.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::BackendRejected(_) => "rejected",
            Self::ProductUnavailable(_) => "product_unavailable",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::PromotionRejected(_) => "promotion_rejected",
            Self::NotInCart(_) => "not_in_cart",
            Self::InvalidQuantity => "invalid_quantity",
            Self::EmptyCart => "empty_cart",
            Self::Infrastructure(_) => "unavailable",
        }
    }

    /// Whether this failure is about stock, so callers can warn specifically.
    #[must_use]
    pub const fn is_stock_related(&self) -> bool {
        matches!(self, Self::InsufficientStock(_) | Self::ProductUnavailable(_))
    }
}
