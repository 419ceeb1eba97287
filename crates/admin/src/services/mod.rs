//! Business logic services for admin.
//!
//! # Services
//!
//! - `order_status` - Order lifecycle transitions and their stock effects
//! - `inventory` - Availability oracle, stock checks, low-stock report
//! - `checkout` - Order placement from a customer's cart
//! - `promotion` - Voucher catalog consulted at checkout

pub mod checkout;
pub mod inventory;
pub mod order_status;
pub mod promotion;

pub use checkout::{CheckoutError, CheckoutService, ShippingPolicy};
pub use inventory::{InventoryError, InventoryService};
pub use order_status::{
    OrderStatusService, StatusAction, TransitionError, TransitionOutcome, TransitionResponse,
    available_actions,
};
pub use promotion::PromotionCatalog;
