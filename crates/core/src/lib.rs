//! Mercato Core - Shared domain types.
//!
//! This crate provides the types shared by all Mercato components:
//! - `storefront` - Customer-facing cart and checkout service
//! - `admin` - Staff back office that owns the inventory ledger and orders
//! - `cli` - Command-line tools for migrations and stock management
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. The order status transition table and the cart
//! reconciliation rules live here so both services agree on them.
//!
//! # Modules
//!
//! - [`types`] - IDs, prices, order status, orders, carts, and availability

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
