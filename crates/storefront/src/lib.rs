//! Mercato Storefront library.
//!
//! Customer-facing cart and checkout service. The cart is held in the
//! session and reconciled against the back office's availability oracle;
//! orders are placed with the back office, which owns all stock.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod cart;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
