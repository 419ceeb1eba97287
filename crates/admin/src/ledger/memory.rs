//! In-process inventory ledger.
//!
//! All state sits behind one mutex and every call applies its whole change
//! while holding it, with no await in between, so calls are atomic and a
//! cancelled call changes nothing. Used by tests and local tooling; supports
//! artificial latency and injected failures.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use mercato_core::{
    InventoryEffect, Order, OrderId, OrderStatus, Price, ProductId, ProductStock, StockShortage,
};

use super::{InventoryLedger, LedgerError, NewOrder, StockOperation};

/// In-memory inventory ledger.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Faults>,
}

#[derive(Debug, Default)]
struct MemoryState {
    products: BTreeMap<ProductId, MemoryProduct>,
    orders: BTreeMap<OrderId, Order>,
    last_product_id: i64,
    last_order_id: i64,
}

#[derive(Debug, Clone)]
struct MemoryProduct {
    stock: ProductStock,
    deleted: bool,
}

#[derive(Debug, Default)]
struct Faults {
    unavailable: AtomicBool,
    fail_next: AtomicU32,
    latency_ms: AtomicU64,
}

impl MemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product with the next free ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger lock is poisoned.
    pub fn add_product(
        &self,
        name: &str,
        price: Price,
        stock: u32,
    ) -> Result<ProductId, LedgerError> {
        let mut state = self.lock()?;
        let id = ProductId::new(state.last_product_id + 1);
        state.insert_product(ProductStock {
            product_id: id,
            name: name.to_string(),
            price,
            image: None,
            stock,
        });
        Ok(id)
    }

    /// Insert or replace a product under its own ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger lock is poisoned.
    pub fn put_product(&self, product: ProductStock) -> Result<(), LedgerError> {
        self.lock()?.insert_product(product);
        Ok(())
    }

    /// Take a product off sale. Its stock record stays.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ProductNotFound`] if the product does not exist.
    pub fn remove_product(&self, product_id: ProductId) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(LedgerError::ProductNotFound(product_id))?;
        product.deleted = true;
        Ok(())
    }

    /// Change a product's price.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ProductNotFound`] if the product does not exist.
    pub fn set_price(&self, product_id: ProductId, price: Price) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(LedgerError::ProductNotFound(product_id))?;
        product.stock.price = price;
        Ok(())
    }

    /// Overwrite a product's stock level.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ProductNotFound`] if the product does not exist.
    pub fn set_stock(&self, product_id: ProductId, stock: u32) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(LedgerError::ProductNotFound(product_id))?;
        product.stock.stock = stock;
        Ok(())
    }

    /// Current stock of a product, removed or not.
    #[must_use]
    pub fn stock_of(&self, product_id: ProductId) -> Option<u32> {
        let state = self.state.lock().ok()?;
        state.products.get(&product_id).map(|p| p.stock.stock)
    }

    /// Insert or replace an order under its own ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger lock is poisoned.
    pub fn put_order(&self, order: Order) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        state.last_order_id = state.last_order_id.max(order.id.get());
        state.orders.insert(order.id, order);
        Ok(())
    }

    /// Make every call fail as if the ledger were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `count` calls as if the ledger were unreachable.
    pub fn fail_next(&self, count: u32) {
        self.faults.fail_next.store(count, Ordering::SeqCst);
    }

    /// Delay every call by `latency` before it touches any state.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.faults.latency_ms.store(millis, Ordering::SeqCst);
    }

    /// Apply configured latency and faults.
    async fn simulate(&self) -> Result<(), LedgerError> {
        let latency = self.faults.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("ledger is offline".to_string()));
        }

        let consumed = self
            .faults
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(LedgerError::Unavailable("injected failure".to_string()));
        }

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, LedgerError> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".to_string()))
    }
}

impl MemoryState {
    fn insert_product(&mut self, product: ProductStock) {
        self.last_product_id = self.last_product_id.max(product.product_id.get());
        self.products.insert(
            product.product_id,
            MemoryProduct {
                stock: product,
                deleted: false,
            },
        );
    }

    fn on_sale(&self, product_id: ProductId) -> Option<&ProductStock> {
        self.products
            .get(&product_id)
            .filter(|p| !p.deleted)
            .map(|p| &p.stock)
    }

    /// Find the first line, in product order, that stock cannot cover.
    fn first_shortage(&self, quantities: &[(ProductId, u32)]) -> Result<(), LedgerError> {
        for (product_id, quantity) in quantities {
            let product = self
                .products
                .get(product_id)
                .ok_or(LedgerError::ProductNotFound(*product_id))?;
            if product.stock.stock < *quantity {
                return Err(LedgerError::InsufficientStock(StockShortage {
                    product_id: *product_id,
                    name: product.stock.name.clone(),
                    available: product.stock.stock,
                    required: *quantity,
                }));
            }
        }
        Ok(())
    }
}

impl InventoryLedger for MemoryLedger {
    async fn product(&self, product_id: ProductId) -> Result<Option<ProductStock>, LedgerError> {
        self.simulate().await?;
        let state = self.lock()?;
        Ok(state.on_sale(product_id).cloned())
    }

    async fn products(&self, product_ids: &[ProductId]) -> Result<Vec<ProductStock>, LedgerError> {
        self.simulate().await?;
        let state = self.lock()?;
        let mut found: Vec<ProductStock> = product_ids
            .iter()
            .filter_map(|id| state.on_sale(*id).cloned())
            .collect();
        found.sort_by_key(|p| p.product_id);
        found.dedup_by_key(|p| p.product_id);
        Ok(found)
    }

    async fn low_stock(&self, threshold: u32) -> Result<Vec<ProductStock>, LedgerError> {
        self.simulate().await?;
        let state = self.lock()?;
        let mut low: Vec<ProductStock> = state
            .products
            .values()
            .filter(|p| !p.deleted && p.stock.stock <= threshold)
            .map(|p| p.stock.clone())
            .collect();
        low.sort_by_key(|p| (p.stock, p.product_id));
        Ok(low)
    }

    async fn adjust_stock(
        &self,
        product_id: ProductId,
        change: u32,
        operation: StockOperation,
    ) -> Result<ProductStock, LedgerError> {
        self.simulate().await?;
        let mut state = self.lock()?;
        let product = state
            .products
            .get_mut(&product_id)
            .filter(|p| !p.deleted)
            .ok_or(LedgerError::ProductNotFound(product_id))?;

        product.stock.stock = match operation {
            StockOperation::Add => product
                .stock
                .stock
                .checked_add(change)
                .ok_or(LedgerError::QuantityOutOfRange(change))?,
            StockOperation::Subtract => product.stock.stock.checked_sub(change).ok_or_else(|| {
                LedgerError::InsufficientStock(StockShortage {
                    product_id,
                    name: product.stock.name.clone(),
                    available: product.stock.stock,
                    required: change,
                })
            })?,
        };

        tracing::info!(
            product_id = %product_id,
            ?operation,
            change,
            stock = product.stock.stock,
            "Stock adjusted"
        );
        Ok(product.stock.clone())
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, LedgerError> {
        self.simulate().await?;
        let mut state = self.lock()?;
        state.last_order_id += 1;
        let id = OrderId::new(state.last_order_id);
        let total = order.total();

        let created = Order {
            id,
            customer_id: order.customer_id,
            created_at: Utc::now(),
            status: OrderStatus::Pending,
            promotion_code: order.promotion_code,
            shipping_fee: order.shipping_fee,
            total,
            lines: order.lines,
        };
        state.orders.insert(id, created.clone());

        tracing::info!(order_id = %id, total = %total, "Order created");
        Ok(created)
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<Order>, LedgerError> {
        self.simulate().await?;
        let state = self.lock()?;
        Ok(state.orders.get(&order_id).cloned())
    }

    async fn apply_transition(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        effect: InventoryEffect,
    ) -> Result<Order, LedgerError> {
        self.simulate().await?;
        let mut state = self.lock()?;

        let order = state
            .orders
            .get(&order_id)
            .ok_or(LedgerError::OrderNotFound(order_id))?;
        if order.status != expected {
            return Err(LedgerError::StatusChanged {
                order_id,
                expected,
                current: order.status,
            });
        }
        let quantities = order.quantities();

        // Validate everything before mutating anything.
        match effect {
            InventoryEffect::Commit => state.first_shortage(&quantities)?,
            InventoryEffect::Release => {
                for (product_id, quantity) in &quantities {
                    let product = state
                        .products
                        .get(product_id)
                        .ok_or(LedgerError::ProductNotFound(*product_id))?;
                    if product.stock.stock.checked_add(*quantity).is_none() {
                        return Err(LedgerError::QuantityOutOfRange(*quantity));
                    }
                }
            }
            InventoryEffect::None => {}
        }

        for (product_id, quantity) in &quantities {
            let Some(product) = state.products.get_mut(product_id) else {
                continue;
            };
            match effect {
                InventoryEffect::Commit => {
                    product.stock.stock -= quantity;
                    tracing::info!(product_id = %product_id, quantity, stock = product.stock.stock, "Stock committed");
                }
                InventoryEffect::Release => {
                    product.stock.stock += quantity;
                    tracing::info!(product_id = %product_id, quantity, stock = product.stock.stock, "Stock released");
                }
                InventoryEffect::None => {}
            }
        }

        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(LedgerError::OrderNotFound(order_id))?;
        order.status = next;
        Ok(order.clone())
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        self.simulate().await
    }
}
