//! Cart reconciliation engine.
//!
//! The cart lives in the customer's session and is only a cache: prices,
//! names and stock limits in it are whatever the availability oracle last
//! said. The engine keeps that cache honest:
//!
//! - additions go through the back office first and touch the local cart only
//!   once it has accepted them
//! - quantity changes are checked against the oracle and clamped to what is
//!   left in stock
//! - [`CartEngine::validate_cart`] re-checks every item, dropping the ones that
//!   are gone; it runs before the cart is shown and before checkout
//!
//! When the oracle cannot be reached the engine favours availability: the
//! customer's change is applied unchecked and reported as unverified. Checkout
//! re-derives every line from the live catalog, so an unchecked cart can never
//! over-commit stock.

mod error;
mod report;

use futures::future::join_all;
use mercato_core::{
    AddToCartRequest, Cart, CartLine, NewOrderLine, Order, PlaceOrderRequest, ProductId,
    Reconciliation,
};
use tracing::instrument;

pub use error::CartError;
pub use report::{ClampedItem, RemovedItem, UpdateOutcome, ValidationReport};

use crate::backend::{AvailabilityOracle, CartBackend};
use crate::models::CurrentCustomer;

/// Who is acting on the cart.
///
/// Built per request from the session; the engine never looks at the session
/// itself.
#[derive(Debug, Clone, Default)]
pub struct CustomerContext {
    customer: Option<CurrentCustomer>,
}

impl CustomerContext {
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { customer: None }
    }

    #[must_use]
    pub const fn authenticated(customer: CurrentCustomer) -> Self {
        Self {
            customer: Some(customer),
        }
    }

    /// The signed-in customer.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Unauthenticated` for anonymous visitors.
    pub const fn require(&self) -> Result<&CurrentCustomer, CartError> {
        match &self.customer {
            Some(customer) => Ok(customer),
            None => Err(CartError::Unauthenticated),
        }
    }
}

impl From<Option<CurrentCustomer>> for CustomerContext {
    fn from(customer: Option<CurrentCustomer>) -> Self {
        Self { customer }
    }
}

/// Applies cart operations against the oracle and the back office.
pub struct CartEngine<O, B> {
    oracle: O,
    backend: B,
}

impl<O: AvailabilityOracle, B: CartBackend> CartEngine<O, B> {
    pub const fn new(oracle: O, backend: B) -> Self {
        Self { oracle, backend }
    }

    /// Add `quantity` units of a product.
    ///
    /// The back office validates the addition and returns the canonical line;
    /// only then is it merged into the cart (quantities add for a product
    /// already present).
    ///
    /// # Errors
    ///
    /// Fails without touching the cart when the customer is not signed in,
    /// the quantity is zero, or the back office refuses or cannot be reached.
    #[instrument(skip(self, ctx, cart))]
    pub async fn add_to_cart(
        &self,
        ctx: &CustomerContext,
        cart: &mut Cart,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine, CartError> {
        let customer = ctx.require()?;
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let request = AddToCartRequest {
            customer_id: customer.id,
            product_id,
            quantity,
        };
        let line = self.backend.add_line(&request).await.map_err(|e| {
            tracing::warn!(error = %e, "Back office refused cart addition");
            CartError::from_add(e)
        })?;

        cart.merge(line.clone());
        tracing::info!(
            quantity = line.quantity,
            total_items = cart.total_items(),
            "Item added to cart"
        );
        Ok(line)
    }

    /// Change an item's quantity. Zero removes it.
    ///
    /// A request above the remaining stock is clamped to what is left; a
    /// product that is gone is flagged for removal. If the oracle cannot be
    /// reached the requested quantity is applied as-is.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if the product is not in the cart.
    #[instrument(skip(self, cart))]
    pub async fn update_quantity(
        &self,
        cart: &mut Cart,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<UpdateOutcome, CartError> {
        if quantity == 0 {
            self.remove_item(cart, product_id);
            return Ok(UpdateOutcome::Removed);
        }
        if !cart.contains(product_id) {
            return Err(CartError::NotInCart(product_id));
        }

        match self.oracle.check(product_id, quantity).await {
            Ok(result) => cart
                .reconcile_item(product_id, quantity, &result)
                .map(UpdateOutcome::from)
                .ok_or(CartError::NotInCart(product_id)),
            Err(e) => {
                tracing::warn!(error = %e, "Availability check failed, applying quantity unverified");
                cart.set_quantity(product_id, quantity);
                Ok(UpdateOutcome::Unverified { quantity })
            }
        }
    }

    /// Remove an item. Removing an absent product is a no-op.
    #[allow(clippy::unused_self)]
    pub fn remove_item(&self, cart: &mut Cart, product_id: ProductId) {
        if cart.remove(product_id).is_some() {
            tracing::debug!(%product_id, "Item removed from cart");
        }
    }

    /// Re-check every item against the oracle.
    ///
    /// Items that are gone are dropped, items above the remaining stock are
    /// clamped, and canonical price, name, image and stock are refreshed.
    /// Items the oracle could not answer for are left exactly as they were.
    /// Running it twice with no stock changes in between leaves the cart as
    /// the first run left it.
    #[instrument(skip_all, fields(items = cart.len()))]
    pub async fn validate_cart(&self, cart: &mut Cart) -> ValidationReport {
        let requests: Vec<(ProductId, u32)> = cart
            .items()
            .iter()
            .map(|item| (item.product_id, item.quantity))
            .collect();

        let answers = join_all(
            requests
                .iter()
                .map(|&(product_id, quantity)| self.oracle.check(product_id, quantity)),
        )
        .await;

        let mut report = ValidationReport::default();
        let mut reasons = Vec::new();

        for ((product_id, quantity), answer) in requests.into_iter().zip(answers) {
            let result = match answer {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(%product_id, error = %e, "Availability check failed");
                    report.unverified.push(product_id);
                    continue;
                }
            };

            match cart.reconcile_item(product_id, quantity, &result) {
                Some(Reconciliation::Clamped {
                    requested, applied, ..
                }) => {
                    let name = cart
                        .get(product_id)
                        .map(|item| item.name.clone())
                        .unwrap_or_default();
                    report.clamped.push(ClampedItem {
                        product_id,
                        name,
                        requested,
                        applied,
                    });
                }
                Some(Reconciliation::Unavailable { reason }) => reasons.push((product_id, reason)),
                Some(Reconciliation::Applied { .. }) | None => {}
            }
        }

        // An item flagged earlier but not checked now may have been restocked.
        report.removed = cart
            .items()
            .iter()
            .filter(|item| item.unavailable && !report.unverified.contains(&item.product_id))
            .map(|item| RemovedItem {
                product_id: item.product_id,
                name: item.name.clone(),
                reason: reasons
                    .iter()
                    .find(|(id, _)| *id == item.product_id)
                    .map_or_else(|| "Product is unavailable".to_string(), |(_, r)| r.clone()),
            })
            .collect();
        for removed in &report.removed {
            cart.remove(removed.product_id);
        }

        report.price_changed = cart
            .items()
            .iter()
            .filter(|item| item.price_changed)
            .map(|item| item.product_id)
            .collect();

        if !report.is_clean() {
            tracing::info!(
                removed = report.removed.len(),
                clamped = report.clamped.len(),
                "Cart reconciled with changes"
            );
        }

        report
    }

    /// Empty the cart.
    #[allow(clippy::unused_self)]
    pub fn clear_cart(&self, cart: &mut Cart) {
        cart.clear();
    }

    /// Clear the price-changed flags once the customer has seen them.
    #[allow(clippy::unused_self)]
    pub fn acknowledge_price_changes(&self, cart: &mut Cart) {
        cart.acknowledge_price_changes();
    }

    /// Place an order for the cart's contents and clear it on success.
    ///
    /// Only product IDs and quantities are sent; the back office prices the
    /// order from its live catalog.
    ///
    /// # Errors
    ///
    /// Fails without touching the cart when the customer is not signed in, the
    /// cart is empty, or the back office refuses or cannot be reached.
    #[instrument(skip(self, ctx, cart))]
    pub async fn place_order(
        &self,
        ctx: &CustomerContext,
        cart: &mut Cart,
        promotion_code: Option<String>,
    ) -> Result<Order, CartError> {
        let customer = ctx.require()?;
        if cart.is_empty() {
            return Err(CartError::EmptyCart);
        }

        let request = PlaceOrderRequest {
            customer_id: customer.id,
            lines: cart
                .items()
                .iter()
                .map(|item| NewOrderLine {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
            promotion_code,
        };

        let order = self.backend.place_order(&request).await.map_err(|e| {
            tracing::warn!(error = %e, "Order placement failed");
            CartError::from_checkout(e)
        })?;

        cart.clear();
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use mercato_core::{
        AvailabilityResult, CustomerId, OrderId, OrderStatus, Price, ProductStock,
    };

    use super::*;
    use crate::backend::BackendError;

    /// In-memory catalog standing in for the back office.
    #[derive(Clone, Default)]
    struct FakeBackend {
        products: Arc<Mutex<HashMap<ProductId, ProductStock>>>,
        down: Arc<Mutex<bool>>,
        orders: Arc<Mutex<Vec<PlaceOrderRequest>>>,
    }

    impl FakeBackend {
        fn with(products: &[(i64, &str, i64, u32)]) -> Self {
            let backend = Self::default();
            for &(id, name, price, stock) in products {
                backend.put(id, name, price, stock);
            }
            backend
        }

        fn put(&self, id: i64, name: &str, price: i64, stock: u32) {
            self.products.lock().unwrap().insert(
                ProductId::new(id),
                ProductStock {
                    product_id: ProductId::new(id),
                    name: name.to_string(),
                    price: Price::from_units(price),
                    image: None,
                    stock,
                },
            );
        }

        fn delete(&self, id: i64) {
            self.products.lock().unwrap().remove(&ProductId::new(id));
        }

        fn set_down(&self, down: bool) {
            *self.down.lock().unwrap() = down;
        }

        fn check_up(&self) -> Result<(), BackendError> {
            if *self.down.lock().unwrap() {
                Err(BackendError::Unavailable("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl AvailabilityOracle for FakeBackend {
        async fn check(
            &self,
            product_id: ProductId,
            quantity: u32,
        ) -> Result<AvailabilityResult, BackendError> {
            self.check_up()?;
            let products = self.products.lock().unwrap();
            Ok(AvailabilityResult::evaluate(
                products.get(&product_id),
                quantity,
            ))
        }
    }

    impl CartBackend for FakeBackend {
        async fn add_line(&self, request: &AddToCartRequest) -> Result<CartLine, BackendError> {
            self.check_up()?;
            let products = self.products.lock().unwrap();
            let Some(product) = products.get(&request.product_id) else {
                return Err(BackendError::Api {
                    status: 404,
                    message: format!("product {} not found", request.product_id),
                });
            };
            let result = AvailabilityResult::evaluate(Some(product), request.quantity);
            if !result.available {
                return Err(BackendError::Api {
                    status: 400,
                    message: result.reason_or_default(),
                });
            }
            Ok(CartLine {
                product_id: product.product_id,
                name: product.name.clone(),
                price: product.price,
                image: product.image.clone(),
                quantity: request.quantity,
            })
        }

        async fn place_order(&self, request: &PlaceOrderRequest) -> Result<Order, BackendError> {
            self.check_up()?;
            self.orders.lock().unwrap().push(request.clone());
            Ok(Order {
                id: OrderId::new(1),
                customer_id: request.customer_id,
                created_at: Utc::now(),
                status: OrderStatus::Pending,
                promotion_code: request.promotion_code.clone(),
                shipping_fee: Price::ZERO,
                total: Price::ZERO,
                lines: Vec::new(),
            })
        }
    }

    fn engine(backend: &FakeBackend) -> CartEngine<FakeBackend, FakeBackend> {
        CartEngine::new(backend.clone(), backend.clone())
    }

    fn signed_in() -> CustomerContext {
        CustomerContext::authenticated(CurrentCustomer {
            id: CustomerId::new(11),
            display_name: None,
        })
    }

    #[tokio::test]
    async fn test_add_requires_customer() {
        let backend = FakeBackend::with(&[(7, "Mug", 100, 10)]);
        let mut cart = Cart::new();

        let err = engine(&backend)
            .add_to_cart(&CustomerContext::anonymous(), &mut cart, ProductId::new(7), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::Unauthenticated));
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_add_merges_quantities() {
        let backend = FakeBackend::with(&[(7, "Mug", 100, 10)]);
        let engine = engine(&backend);
        let mut cart = Cart::new();

        engine
            .add_to_cart(&signed_in(), &mut cart, ProductId::new(7), 2)
            .await
            .unwrap();
        engine
            .add_to_cart(&signed_in(), &mut cart, ProductId::new(7), 3)
            .await
            .unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.get(ProductId::new(7)).unwrap().quantity, 5);
    }

    #[tokio::test]
    async fn test_add_rejected_leaves_cart_unchanged() {
        let backend = FakeBackend::with(&[(7, "Mug", 100, 0)]);
        let engine = engine(&backend);
        let mut cart = Cart::new();

        let err = engine
            .add_to_cart(&signed_in(), &mut cart, ProductId::new(7), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::BackendRejected(ref m) if m == "Out of stock"));
        assert!(cart.is_empty());

        let err = engine
            .add_to_cart(&signed_in(), &mut cart, ProductId::new(99), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::ProductUnavailable(_)));

        backend.set_down(true);
        let err = engine
            .add_to_cart(&signed_in(), &mut cart, ProductId::new(7), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::Infrastructure(_)));
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_add_then_reconcile_keeps_canonical_fields() {
        let backend = FakeBackend::with(&[(7, "Mug", 100, 10)]);
        let engine = engine(&backend);
        let mut cart = Cart::new();

        engine
            .add_to_cart(&signed_in(), &mut cart, ProductId::new(7), 2)
            .await
            .unwrap();
        let report = engine.validate_cart(&mut cart).await;

        assert!(report.is_clean());
        let item = cart.get(ProductId::new(7)).unwrap();
        assert_eq!(item.quantity, 2);
        assert_eq!(item.price, Price::from_units(100));
        assert_eq!(item.max_stock, Some(10));
        assert!(!item.price_changed);
    }

    #[tokio::test]
    async fn test_update_zero_removes() {
        let backend = FakeBackend::with(&[(7, "Mug", 100, 10)]);
        let engine = engine(&backend);
        let mut cart = Cart::new();
        engine
            .add_to_cart(&signed_in(), &mut cart, ProductId::new(7), 2)
            .await
            .unwrap();

        let outcome = engine
            .update_quantity(&mut cart, ProductId::new(7), 0)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Removed);
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_update_clamps_to_remaining_stock() {
        let backend = FakeBackend::with(&[(7, "Mug", 100, 10)]);
        let engine = engine(&backend);
        let mut cart = Cart::new();
        engine
            .add_to_cart(&signed_in(), &mut cart, ProductId::new(7), 2)
            .await
            .unwrap();

        backend.put(7, "Mug", 100, 4);
        let outcome = engine
            .update_quantity(&mut cart, ProductId::new(7), 6)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            UpdateOutcome::Clamped {
                requested: 6,
                applied: 4,
                ..
            }
        ));
        assert_eq!(cart.get(ProductId::new(7)).unwrap().quantity, 4);
    }

    #[tokio::test]
    async fn test_update_out_of_stock_flags_then_validate_removes() {
        let backend = FakeBackend::with(&[(7, "Mug", 100, 10)]);
        let engine = engine(&backend);
        let mut cart = Cart::new();
        engine
            .add_to_cart(&signed_in(), &mut cart, ProductId::new(7), 1)
            .await
            .unwrap();

        backend.put(7, "Mug", 100, 0);
        let outcome = engine
            .update_quantity(&mut cart, ProductId::new(7), 3)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            UpdateOutcome::Unavailable {
                reason: "Out of stock".to_string()
            }
        );
        assert!(cart.get(ProductId::new(7)).unwrap().unavailable);

        let report = engine.validate_cart(&mut cart).await;
        assert!(cart.is_empty());
        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.notices()[0], "1 item removed");
    }

    #[tokio::test]
    async fn test_validate_keeps_flagged_item_it_could_not_check() {
        let backend = FakeBackend::with(&[(1, "Mug", 100, 10)]);
        let engine = engine(&backend);
        let mut cart = Cart::new();
        engine
            .add_to_cart(&signed_in(), &mut cart, ProductId::new(1), 1)
            .await
            .unwrap();

        backend.put(1, "Mug", 100, 0);
        let outcome = engine
            .update_quantity(&mut cart, ProductId::new(1), 2)
            .await
            .unwrap();
        assert!(matches!(outcome, UpdateOutcome::Unavailable { .. }));

        backend.put(1, "Mug", 100, 5);
        backend.set_down(true);
        let report = engine.validate_cart(&mut cart).await;

        assert!(report.removed.is_empty());
        assert_eq!(report.unverified, vec![ProductId::new(1)]);
        assert_eq!(cart.len(), 1);

        // Once the oracle is back the restocked item is cleared for sale.
        backend.set_down(false);
        let report = engine.validate_cart(&mut cart).await;
        assert!(report.removed.is_empty());
        assert!(!cart.get(ProductId::new(1)).unwrap().unavailable);
    }

    #[tokio::test]
    async fn test_update_unknown_product() {
        let backend = FakeBackend::default();
        let mut cart = Cart::new();
        let err = engine(&backend)
            .update_quantity(&mut cart, ProductId::new(3), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::NotInCart(_)));
    }

    #[tokio::test]
    async fn test_update_with_oracle_down_applies_unverified() {
        let backend = FakeBackend::with(&[(7, "Mug", 100, 10)]);
        let engine = engine(&backend);
        let mut cart = Cart::new();
        engine
            .add_to_cart(&signed_in(), &mut cart, ProductId::new(7), 1)
            .await
            .unwrap();

        backend.set_down(true);
        let outcome = engine
            .update_quantity(&mut cart, ProductId::new(7), 4)
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::Unverified { quantity: 4 });
        let item = cart.get(ProductId::new(7)).unwrap();
        assert_eq!(item.quantity, 4);
        assert_eq!(item.max_stock, None);
    }

    #[tokio::test]
    async fn test_validate_is_idempotent() {
        let backend = FakeBackend::with(&[(1, "Mug", 100, 10), (2, "Cup", 50, 3), (3, "Jar", 20, 5)]);
        let engine = engine(&backend);
        let mut cart = Cart::new();
        engine.add_to_cart(&signed_in(), &mut cart, ProductId::new(1), 2).await.unwrap();
        engine.add_to_cart(&signed_in(), &mut cart, ProductId::new(2), 3).await.unwrap();
        engine.add_to_cart(&signed_in(), &mut cart, ProductId::new(3), 1).await.unwrap();

        backend.put(1, "Mug", 120, 10);
        backend.put(2, "Cup", 50, 1);
        backend.delete(3);

        let first = engine.validate_cart(&mut cart).await;
        let snapshot = cart.clone();
        let second = engine.validate_cart(&mut cart).await;

        assert_eq!(cart, snapshot);
        assert_eq!(first.removed.len(), 1);
        assert_eq!(first.removed[0].reason, "Product no longer exists");
        assert_eq!(first.clamped.len(), 1);
        assert_eq!(first.price_changed, vec![ProductId::new(1)]);
        assert!(second.is_clean());
        assert_eq!(second.price_changed, vec![ProductId::new(1)]);
    }

    #[tokio::test]
    async fn test_validate_with_oracle_down_keeps_items() {
        let backend = FakeBackend::with(&[(7, "Mug", 100, 10)]);
        let engine = engine(&backend);
        let mut cart = Cart::new();
        engine
            .add_to_cart(&signed_in(), &mut cart, ProductId::new(7), 2)
            .await
            .unwrap();
        let before = cart.clone();

        backend.set_down(true);
        let report = engine.validate_cart(&mut cart).await;

        assert_eq!(cart, before);
        assert_eq!(report.unverified, vec![ProductId::new(7)]);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_acknowledge_clears_price_flags() {
        let backend = FakeBackend::with(&[(7, "Mug", 100, 10)]);
        let engine = engine(&backend);
        let mut cart = Cart::new();
        engine
            .add_to_cart(&signed_in(), &mut cart, ProductId::new(7), 1)
            .await
            .unwrap();

        backend.put(7, "Mug", 90, 10);
        engine.validate_cart(&mut cart).await;
        assert!(cart.get(ProductId::new(7)).unwrap().price_changed);

        engine.acknowledge_price_changes(&mut cart);
        let report = engine.validate_cart(&mut cart).await;
        assert!(report.price_changed.is_empty());
        assert_eq!(cart.get(ProductId::new(7)).unwrap().price, Price::from_units(90));
    }

    #[tokio::test]
    async fn test_place_order_sends_ids_and_clears() {
        let backend = FakeBackend::with(&[(7, "Mug", 100, 10)]);
        let engine = engine(&backend);
        let mut cart = Cart::new();

        let err = engine
            .place_order(&signed_in(), &mut cart, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::EmptyCart));

        engine
            .add_to_cart(&signed_in(), &mut cart, ProductId::new(7), 2)
            .await
            .unwrap();
        let order = engine
            .place_order(&signed_in(), &mut cart, Some("SPRING".to_string()))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert!(cart.is_empty());
        let sent = backend.orders.lock().unwrap();
        assert_eq!(
            sent[0].lines,
            vec![NewOrderLine {
                product_id: ProductId::new(7),
                quantity: 2
            }]
        );
        assert_eq!(sent[0].promotion_code.as_deref(), Some("SPRING"));
    }

    #[tokio::test]
    async fn test_place_order_failure_keeps_cart() {
        let backend = FakeBackend::with(&[(7, "Mug", 100, 10)]);
        let engine = engine(&backend);
        let mut cart = Cart::new();
        engine
            .add_to_cart(&signed_in(), &mut cart, ProductId::new(7), 2)
            .await
            .unwrap();

        backend.set_down(true);
        let err = engine
            .place_order(&signed_in(), &mut cart, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::Infrastructure(_)));
        assert_eq!(cart.total_items(), 2);
    }
}
