//! Client-held shopping cart and its reconciliation rules.
//!
//! The cart is a cache of what the customer intends to buy. Prices, names and
//! stock limits stored here are whatever the storefront last heard from the
//! availability oracle; [`Cart::reconcile_item`] folds a fresh
//! [`AvailabilityResult`] back into an item.
//!
//! Invariants held by [`Cart`]:
//! - no two items share a product ID
//! - every item has `quantity >= 1`

use serde::{Deserialize, Serialize};

use crate::{AvailabilityResult, CustomerId, Price, ProductId};

/// Observable sub-state of a cart item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartItemState {
    Normal,
    PriceChanged,
    Unavailable,
}

/// One product line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    /// Unit price as last known by the client.
    pub price: Price,
    #[serde(default)]
    pub image: Option<String>,
    pub quantity: u32,
    /// Stock the oracle last reported, if it has been asked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stock: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub price_changed: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unavailable: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

impl CartItem {
    /// Current sub-state; `Unavailable` dominates `PriceChanged`.
    #[must_use]
    pub const fn state(&self) -> CartItemState {
        if self.unavailable {
            CartItemState::Unavailable
        } else if self.price_changed {
            CartItemState::PriceChanged
        } else {
            CartItemState::Normal
        }
    }

    /// Price of the whole line at the cached unit price.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }

    /// Overwrite cached catalog fields with the oracle's canonical values.
    ///
    /// `price_changed` is sticky: once a divergence has been seen it stays set
    /// until the customer acknowledges it, so repeated reconciliation against
    /// an unchanged ledger leaves the item untouched.
    fn apply_canonical(&mut self, result: &AvailabilityResult) {
        if let Some(price) = result.current_price {
            if price != self.price {
                self.price_changed = true;
            }
            self.price = price;
        }
        if let Some(name) = &result.current_name {
            self.name.clone_from(name);
        }
        if result.current_image.is_some() {
            self.image.clone_from(&result.current_image);
        }
        if result.current_stock.is_some() {
            self.max_stock = result.current_stock;
        }
        self.unavailable = false;
    }
}

/// Canonical line returned by the backend when an item is added to a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image: Option<String>,
    pub quantity: u32,
}

/// Body of the backend `cart.add` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// What reconciling one item against the oracle did to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reconciliation {
    /// The requested quantity is available and was applied.
    Applied { quantity: u32 },
    /// Only part of the request is in stock; quantity was reduced to it.
    Clamped {
        requested: u32,
        applied: u32,
        reason: String,
    },
    /// The product is gone; the item is flagged for removal.
    Unavailable { reason: String },
}

/// The customer's cart: items keyed by product ID, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CartItem>", into = "Vec<CartItem>")]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Items in display order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    fn get_mut(&mut self, product_id: ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.product_id == product_id)
    }

    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.get(product_id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Merge a backend-confirmed line: quantities add for an existing
    /// product, otherwise a new item is appended. Zero quantities are ignored.
    pub fn merge(&mut self, line: CartLine) {
        if line.quantity == 0 {
            return;
        }

        if let Some(existing) = self.get_mut(line.product_id) {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
            return;
        }

        self.items.push(CartItem {
            product_id: line.product_id,
            name: line.name,
            price: line.price,
            image: line.image,
            quantity: line.quantity,
            max_stock: None,
            price_changed: false,
            unavailable: false,
        });
    }

    /// Remove an item. Returns the removed item, if there was one.
    pub fn remove(&mut self, product_id: ProductId) -> Option<CartItem> {
        let index = self
            .items
            .iter()
            .position(|item| item.product_id == product_id)?;
        Some(self.items.remove(index))
    }

    /// Set a quantity without consulting the oracle. Zero removes the item.
    ///
    /// Returns `false` if the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product_id).is_some();
        }
        match self.get_mut(product_id) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Fold an oracle answer for `requested` units into an item.
    ///
    /// Gone products are flagged `unavailable` (their quantity is left alone
    /// until they are dropped). When only part of the request is in stock the
    /// quantity is clamped to what is left. Returns `None` if the product is
    /// not in the cart or `requested` is zero.
    pub fn reconcile_item(
        &mut self,
        product_id: ProductId,
        requested: u32,
        result: &AvailabilityResult,
    ) -> Option<Reconciliation> {
        if requested == 0 {
            return None;
        }
        let item = self.get_mut(product_id)?;

        if result.is_gone() {
            item.unavailable = true;
            if result.current_stock.is_some() {
                item.max_stock = result.current_stock;
            }
            return Some(Reconciliation::Unavailable {
                reason: result.reason_or_default(),
            });
        }

        item.apply_canonical(result);

        if let Some(limit) = result.limited_to() {
            let applied = limit.min(requested);
            item.quantity = applied;
            return Some(Reconciliation::Clamped {
                requested,
                applied,
                reason: result.reason_or_default(),
            });
        }

        item.quantity = requested;
        Some(Reconciliation::Applied {
            quantity: requested,
        })
    }

    /// Clear every `price_changed` flag once the customer has seen them.
    pub fn acknowledge_price_changes(&mut self) {
        for item in &mut self.items {
            item.price_changed = false;
        }
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Total number of units across all items.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |sum, item| sum.saturating_add(item.quantity))
    }

    /// Sum of line totals, excluding unavailable items.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.items
            .iter()
            .filter(|item| !item.unavailable)
            .map(CartItem::line_total)
            .sum()
    }
}

impl From<Vec<CartItem>> for Cart {
    /// Rebuild a cart from stored records, restoring the invariants: records
    /// with zero quantity are discarded and duplicates are merged.
    fn from(records: Vec<CartItem>) -> Self {
        let mut cart = Self::new();
        for record in records {
            if record.quantity == 0 {
                continue;
            }
            match cart.get_mut(record.product_id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(record.quantity);
                }
                None => cart.items.push(record),
            }
        }
        cart
    }
}

impl From<Cart> for Vec<CartItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i64, quantity: u32, price: i64) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Price::from_units(price),
            image: None,
            quantity,
        }
    }

    fn oracle(available: bool, stock: Option<u32>, price: i64) -> AvailabilityResult {
        AvailabilityResult {
            available,
            reason: (!available).then(|| "Only a few left".to_string()),
            current_stock: stock,
            current_price: Some(Price::from_units(price)),
            current_name: Some("Canonical name".to_string()),
            current_image: Some("/img/canonical.jpg".to_string()),
        }
    }

    #[test]
    fn test_merge_adds_quantities() {
        let mut cart = Cart::new();
        cart.merge(line(7, 2, 100));
        cart.merge(line(7, 3, 100));
        cart.merge(line(8, 1, 50));

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.get(ProductId::new(7)).unwrap().quantity, 5);
        assert_eq!(cart.total_items(), 6);
    }

    #[test]
    fn test_merge_ignores_zero_quantity() {
        let mut cart = Cart::new();
        cart.merge(line(7, 0, 100));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = Cart::new();
        cart.merge(line(7, 2, 100));
        assert!(cart.set_quantity(ProductId::new(7), 0));
        assert!(!cart.contains(ProductId::new(7)));
        assert!(!cart.set_quantity(ProductId::new(9), 3));
    }

    #[test]
    fn test_reconcile_applies_canonical_fields() {
        let mut cart = Cart::new();
        cart.merge(line(7, 2, 100));

        let outcome = cart
            .reconcile_item(ProductId::new(7), 2, &oracle(true, Some(10), 100))
            .unwrap();

        assert_eq!(outcome, Reconciliation::Applied { quantity: 2 });
        let item = cart.get(ProductId::new(7)).unwrap();
        assert_eq!(item.quantity, 2);
        assert_eq!(item.price, Price::from_units(100));
        assert_eq!(item.max_stock, Some(10));
        assert!(!item.price_changed);
        assert_eq!(item.name, "Canonical name");
        assert_eq!(item.state(), CartItemState::Normal);
    }

    #[test]
    fn test_reconcile_flags_price_change_and_keeps_it() {
        let mut cart = Cart::new();
        cart.merge(line(7, 1, 100));

        cart.reconcile_item(ProductId::new(7), 1, &oracle(true, Some(10), 120));
        assert!(cart.get(ProductId::new(7)).unwrap().price_changed);

        // Same ledger state again: the flag survives.
        cart.reconcile_item(ProductId::new(7), 1, &oracle(true, Some(10), 120));
        let item = cart.get(ProductId::new(7)).unwrap();
        assert!(item.price_changed);
        assert_eq!(item.price, Price::from_units(120));
        assert_eq!(item.state(), CartItemState::PriceChanged);

        cart.acknowledge_price_changes();
        assert!(!cart.get(ProductId::new(7)).unwrap().price_changed);
    }

    #[test]
    fn test_reconcile_clamps_to_remaining_stock() {
        let mut cart = Cart::new();
        cart.merge(line(7, 1, 100));

        let outcome = cart
            .reconcile_item(ProductId::new(7), 5, &oracle(false, Some(3), 100))
            .unwrap();

        assert!(matches!(
            outcome,
            Reconciliation::Clamped {
                requested: 5,
                applied: 3,
                ..
            }
        ));
        assert_eq!(cart.get(ProductId::new(7)).unwrap().quantity, 3);
    }

    #[test]
    fn test_reconcile_marks_gone_products() {
        let mut cart = Cart::new();
        cart.merge(line(7, 1, 100));

        let outcome = cart
            .reconcile_item(ProductId::new(7), 3, &oracle(false, Some(0), 100))
            .unwrap();

        assert!(matches!(outcome, Reconciliation::Unavailable { .. }));
        let item = cart.get(ProductId::new(7)).unwrap();
        assert!(item.unavailable);
        assert_eq!(item.quantity, 1);
        assert_eq!(item.state(), CartItemState::Unavailable);
    }

    #[test]
    fn test_reconcile_unknown_item_is_none() {
        let mut cart = Cart::new();
        assert!(
            cart.reconcile_item(ProductId::new(1), 1, &oracle(true, Some(1), 1))
                .is_none()
        );
    }

    #[test]
    fn test_total_price_skips_unavailable() {
        let mut cart = Cart::new();
        cart.merge(line(1, 2, 100));
        cart.merge(line(2, 1, 40));
        cart.reconcile_item(ProductId::new(2), 1, &AvailabilityResult::missing());

        assert_eq!(cart.total_price(), Price::from_units(200));
    }

    #[test]
    fn test_stored_records_are_normalized() {
        let json = r#"[
            {"productId": 1, "name": "A", "price": "10", "quantity": 2},
            {"productId": 1, "name": "A", "price": "10", "quantity": 1},
            {"productId": 2, "name": "B", "price": "5", "quantity": 0}
        ]"#;
        let cart: Cart = serde_json::from_str(json).unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 3);
    }

    #[test]
    fn test_stored_shape_omits_clear_flags() {
        let mut cart = Cart::new();
        cart.merge(line(7, 2, 100));
        let json = serde_json::to_value(&cart).unwrap();

        let record = &json[0];
        assert_eq!(record["productId"], 7);
        assert_eq!(record["quantity"], 2);
        assert!(record.get("priceChanged").is_none());
        assert!(record.get("unavailable").is_none());
    }
}
