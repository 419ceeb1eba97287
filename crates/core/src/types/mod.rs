//! Core types for Mercato.
//!
//! This module provides type-safe wrappers and the domain model shared by the
//! storefront and the admin back office.

pub mod availability;
pub mod cart;
pub mod id;
pub mod order;
pub mod price;
pub mod promotion;
pub mod status;

pub use availability::{AvailabilityResult, ProductStock, StockShortage};
pub use cart::{AddToCartRequest, Cart, CartItem, CartItemState, CartLine, Reconciliation};
pub use id::*;
pub use order::{
    NewOrderLine, Order, OrderLine, PlaceOrderRequest, merged_quantities, order_total, subtotal,
};
pub use price::Price;
pub use promotion::{AppliedPromotion, PromotionError, Voucher, VoucherKind, allocate_discount};
pub use status::*;
