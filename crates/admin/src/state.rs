//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AdminConfig;
use crate::ledger::InventoryLedger;
use crate::services::{CheckoutService, InventoryService, OrderStatusService, ShippingPolicy};

/// Application state shared across all handlers.
///
/// Generic over the ledger so the full router can be exercised against
/// [`crate::ledger::MemoryLedger`].
pub struct AppState<L> {
    inner: Arc<AppStateInner<L>>,
}

struct AppStateInner<L> {
    config: AdminConfig,
    ledger: L,
    orders: OrderStatusService<L>,
    inventory: InventoryService<L>,
    checkout: CheckoutService<L>,
}

// Manual impl: `L: Clone` is not needed to clone the `Arc`.
impl<L> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: InventoryLedger> AppState<L> {
    /// Build state and the services over `ledger`.
    #[must_use]
    pub fn new(config: AdminConfig, ledger: L) -> Self {
        let timeout = config.ledger_timeout;
        let orders = OrderStatusService::new(ledger.clone(), timeout);
        let inventory =
            InventoryService::new(ledger.clone(), timeout, config.low_stock_threshold);
        let shipping = ShippingPolicy {
            fee: config.shipping_fee,
            free_over: config.free_shipping_threshold,
        };
        let checkout =
            CheckoutService::new(ledger.clone(), timeout, shipping, config.promotions.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                ledger,
                orders,
                inventory,
                checkout,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn ledger(&self) -> &L {
        &self.inner.ledger
    }

    #[must_use]
    pub fn orders(&self) -> &OrderStatusService<L> {
        &self.inner.orders
    }

    #[must_use]
    pub fn inventory(&self) -> &InventoryService<L> {
        &self.inner.inventory
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService<L> {
        &self.inner.checkout
    }
}
