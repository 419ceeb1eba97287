//! Mercato back office library.
//!
//! This crate provides the back office as a library, allowing it to be
//! tested and reused by the CLI.
//!
//! # Security
//!
//! This crate holds the authoritative inventory ledger. Every `/api` route
//! requires the `ADMIN_API_TOKEN` bearer token; bind it to a private network.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
