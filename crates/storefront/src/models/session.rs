//! Session-related types.
//!
//! Types stored in the session for customer identity and the cart.

use serde::{Deserialize, Serialize};

use mercato_core::CustomerId;

/// Session-stored customer identity.
///
/// Written by the identity provider when a customer signs in; the storefront
/// only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentCustomer {
    /// Customer ID known to the back office.
    pub id: CustomerId,
    /// Name to greet the customer with.
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// Key for the customer's cart.
    pub const CART: &str = "cart";
}
