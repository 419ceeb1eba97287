//! Order status transitions coupled to their inventory side effects.
//!
//! Both staff screens (order list and order detail) go through
//! [`OrderStatusService`]: it validates a requested status against the
//! transition table, then asks the ledger to apply the status change and any
//! stock commit or release in one atomic step. The ledger call runs under a
//! timeout; a timeout is reported as an infrastructure failure and never as
//! success.

use std::time::Duration;

use mercato_core::{
    IllegalTransition, InventoryEffect, Order, OrderId, OrderStatus, StockShortage,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::ledger::{InventoryLedger, LedgerError};

/// Why a transition was refused.
///
/// Display strings are part of the wire contract: staff screens branch on the
/// leading words to pick a warning style.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    #[error("Illegal transition: order cannot move from {} to {}", .0.from, .0.to)]
    IllegalTransition(#[from] IllegalTransition),

    #[error(
        "Insufficient stock for {} (product {}): {} available, {} required, short by {}",
        .0.name, .0.product_id, .0.available, .0.required, .0.shortage()
    )]
    InsufficientStock(StockShortage),

    /// Another transition moved the order first; the requested move is still
    /// legal from where it is now, so a retry may succeed.
    #[error("Conflict: order {order_id} was changed to {current} by another request")]
    Conflict {
        order_id: OrderId,
        current: OrderStatus,
    },

    /// The ledger failed or timed out. Nothing was applied.
    #[error("Infrastructure failure: {0}; order status unchanged")]
    Infrastructure(String),
}

impl TransitionError {
    /// Status the order is known to be in after this failure, if any.
    #[must_use]
    pub const fn current_status(&self) -> Option<OrderStatus> {
        match self {
            Self::IllegalTransition(e) => Some(e.from),
            Self::Conflict { current, .. } => Some(*current),
            _ => None,
        }
    }
}

/// A successful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// The order after the change.
    pub order: Order,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    /// Whether stock was committed or released.
    pub inventory_adjusted: bool,
}

/// Wire response for `order.transition`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    pub success: bool,
    pub message: String,
    pub order_id: OrderId,
    pub old_status: Option<OrderStatus>,
    pub new_status: Option<OrderStatus>,
    pub inventory_adjusted: bool,
}

impl TransitionResponse {
    /// Build the response for a finished transition attempt.
    ///
    /// On failure the order did not move, so both statuses report the status
    /// it is known to be in (or nothing when that is unknown).
    #[must_use]
    pub fn from_result(order_id: OrderId, result: &Result<TransitionOutcome, TransitionError>) -> Self {
        match result {
            Ok(outcome) => {
                let mut message = format!(
                    "Order {order_id} moved from {} to {}",
                    outcome.old_status, outcome.new_status
                );
                if outcome.inventory_adjusted {
                    message.push_str("; inventory adjusted");
                }
                Self {
                    success: true,
                    message,
                    order_id,
                    old_status: Some(outcome.old_status),
                    new_status: Some(outcome.new_status),
                    inventory_adjusted: outcome.inventory_adjusted,
                }
            }
            Err(err) => Self {
                success: false,
                message: err.to_string(),
                order_id,
                old_status: err.current_status(),
                new_status: err.current_status(),
                inventory_adjusted: false,
            },
        }
    }
}

/// A legal next step for an order, as shown to staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusAction {
    pub status: OrderStatus,
    pub label: String,
    pub adjusts_inventory: bool,
}

/// Legal next steps from `current`, in transition-table order.
#[must_use]
pub fn available_actions(current: OrderStatus) -> Vec<StatusAction> {
    current
        .allowed_transitions()
        .iter()
        .filter_map(|next| {
            let effect = current.transition_to(*next).ok()?;
            Some(StatusAction {
                status: *next,
                label: next.action_label()?.to_string(),
                adjusts_inventory: effect.adjusts_inventory(),
            })
        })
        .collect()
}

/// Drives orders through the status lifecycle.
#[derive(Debug, Clone)]
pub struct OrderStatusService<L> {
    ledger: L,
    timeout: Duration,
}

impl<L: InventoryLedger> OrderStatusService<L> {
    /// Create a service; every ledger call is bounded by `timeout`.
    #[must_use]
    pub const fn new(ledger: L, timeout: Duration) -> Self {
        Self { ledger, timeout }
    }

    /// Look up an order.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::OrderNotFound`] for unknown IDs and
    /// [`TransitionError::Infrastructure`] if the ledger fails.
    pub async fn order(&self, order_id: OrderId) -> Result<Order, TransitionError> {
        let found = tokio::time::timeout(self.timeout, self.ledger.order(order_id))
            .await
            .map_err(|_| timed_out(order_id))?
            .map_err(|e| from_ledger(e, order_id, None))?;

        found.ok_or(TransitionError::OrderNotFound(order_id))
    }

    /// Legal next steps for an order in its current status.
    ///
    /// # Errors
    ///
    /// Same as [`Self::order`].
    pub async fn available_actions(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<StatusAction>, TransitionError> {
        let order = self.order(order_id).await?;
        Ok(available_actions(order.status))
    }

    /// Move an order to `requested`, applying its inventory effect.
    ///
    /// On any error the order's status and all stock levels are unchanged.
    ///
    /// # Errors
    ///
    /// - [`TransitionError::OrderNotFound`] if the order does not exist
    /// - [`TransitionError::IllegalTransition`] if `requested` is not reachable
    /// - [`TransitionError::InsufficientStock`] if a commit cannot be covered
    /// - [`TransitionError::Conflict`] if a concurrent transition won the race
    /// - [`TransitionError::Infrastructure`] if the ledger failed or timed out
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        order_id: OrderId,
        requested: OrderStatus,
    ) -> Result<TransitionOutcome, TransitionError> {
        let result = self.try_transition(order_id, requested).await;

        match &result {
            Ok(outcome) => tracing::info!(
                old_status = %outcome.old_status,
                new_status = %outcome.new_status,
                inventory_adjusted = outcome.inventory_adjusted,
                "Order status changed"
            ),
            Err(TransitionError::Infrastructure(reason)) => {
                tracing::error!(reason = %reason, "Order transition failed");
            }
            Err(err) => tracing::warn!(error = %err, "Order transition rejected"),
        }

        result
    }

    async fn try_transition(
        &self,
        order_id: OrderId,
        requested: OrderStatus,
    ) -> Result<TransitionOutcome, TransitionError> {
        let order = self.order(order_id).await?;
        let current = order.status;
        let effect = current.transition_to(requested)?;

        let updated = tokio::time::timeout(
            self.timeout,
            self.ledger
                .apply_transition(order_id, current, requested, effect),
        )
        .await
        .map_err(|_| timed_out(order_id))?
        .map_err(|e| from_ledger(e, order_id, Some(requested)))?;

        Ok(TransitionOutcome {
            order: updated,
            old_status: current,
            new_status: requested,
            inventory_adjusted: effect != InventoryEffect::None,
        })
    }
}

fn timed_out(order_id: OrderId) -> TransitionError {
    tracing::error!(order_id = %order_id, "Inventory ledger call timed out");
    TransitionError::Infrastructure("inventory ledger timed out".to_string())
}

/// Map a ledger failure to what the caller of `transition` sees.
fn from_ledger(err: LedgerError, order_id: OrderId, requested: Option<OrderStatus>) -> TransitionError {
    match err {
        LedgerError::OrderNotFound(id) => TransitionError::OrderNotFound(id),
        LedgerError::InsufficientStock(shortage) => TransitionError::InsufficientStock(shortage),
        LedgerError::StatusChanged { current, .. } => match requested {
            Some(to) if !current.can_transition_to(to) => {
                TransitionError::IllegalTransition(IllegalTransition { from: current, to })
            }
            _ => TransitionError::Conflict { order_id, current },
        },
        other => {
            tracing::error!(order_id = %order_id, error = %other, "Inventory ledger failure");
            TransitionError::Infrastructure("inventory ledger unavailable".to_string())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use mercato_core::{CustomerId, OrderLine, Price, ProductId};

    use super::*;
    use crate::ledger::MemoryLedger;

    const ORDER: OrderId = OrderId::new(42);

    fn setup(stock: u32, quantity: u32, status: OrderStatus) -> (MemoryLedger, ProductId) {
        let ledger = MemoryLedger::new();
        let product = ledger
            .add_product("Linen apron", Price::from_units(35), stock)
            .unwrap();
        ledger
            .put_order(Order {
                id: ORDER,
                customer_id: CustomerId::new(9),
                created_at: Utc::now(),
                status,
                promotion_code: None,
                shipping_fee: Price::ZERO,
                total: Price::from_units(35).times(quantity),
                lines: vec![OrderLine {
                    product_id: product,
                    quantity,
                    unit_price: Price::from_units(35),
                    discount: Price::ZERO,
                }],
            })
            .unwrap();
        (ledger, product)
    }

    fn service(ledger: &MemoryLedger) -> OrderStatusService<MemoryLedger> {
        OrderStatusService::new(ledger.clone(), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_skipping_ahead_is_illegal() {
        let (ledger, _) = setup(10, 1, OrderStatus::Pending);
        let err = service(&ledger)
            .transition(ORDER, OrderStatus::Shipped)
            .await
            .unwrap_err();

        assert!(matches!(err, TransitionError::IllegalTransition(_)));
        assert!(err.to_string().starts_with("Illegal transition"));
        let order = ledger.order(ORDER).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_confirm_short_of_stock() {
        let (ledger, product) = setup(3, 5, OrderStatus::Pending);
        let err = service(&ledger)
            .transition(ORDER, OrderStatus::Confirmed)
            .await
            .unwrap_err();

        match &err {
            TransitionError::InsufficientStock(shortage) => {
                assert_eq!(shortage.product_id, product);
                assert_eq!(shortage.shortage(), 2);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
        assert!(err.to_string().starts_with("Insufficient stock"));
        assert_eq!(ledger.stock_of(product), Some(3));
    }

    #[tokio::test]
    async fn test_cancel_confirmed_order_releases_stock() {
        let (ledger, product) = setup(5, 5, OrderStatus::Confirmed);
        let service = service(&ledger);

        let outcome = service
            .transition(ORDER, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert!(outcome.inventory_adjusted);
        assert_eq!(outcome.new_status, OrderStatus::Cancelled);
        assert_eq!(ledger.stock_of(product), Some(10));

        let err = service
            .transition(ORDER, OrderStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn test_cancel_pending_order_leaves_stock() {
        let (ledger, product) = setup(5, 2, OrderStatus::Pending);
        let outcome = service(&ledger)
            .transition(ORDER, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert!(!outcome.inventory_adjusted);
        assert_eq!(ledger.stock_of(product), Some(5));
    }

    #[tokio::test]
    async fn test_ledger_timeout_fails_closed() {
        let (ledger, product) = setup(10, 2, OrderStatus::Pending);
        ledger.set_latency(Duration::from_millis(500));

        let err = service(&ledger)
            .transition(ORDER, OrderStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::Infrastructure(_)));

        ledger.set_latency(Duration::ZERO);
        assert_eq!(ledger.stock_of(product), Some(10));
        let order = ledger.order(ORDER).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_ledger_outage_is_infrastructure() {
        let (ledger, _) = setup(10, 2, OrderStatus::Pending);
        ledger.fail_next(2);
        let err = service(&ledger)
            .transition(ORDER, OrderStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Infrastructure failure"));
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let ledger = MemoryLedger::new();
        let err = service(&ledger)
            .transition(OrderId::new(1), OrderStatus::Confirmed)
            .await
            .unwrap_err();
        assert_eq!(err, TransitionError::OrderNotFound(OrderId::new(1)));
    }

    #[test]
    fn test_stale_status_maps_to_conflict_or_illegal() {
        let stale = |current| LedgerError::StatusChanged {
            order_id: ORDER,
            expected: OrderStatus::Pending,
            current,
        };

        assert_eq!(
            from_ledger(stale(OrderStatus::Confirmed), ORDER, Some(OrderStatus::Cancelled)),
            TransitionError::Conflict {
                order_id: ORDER,
                current: OrderStatus::Confirmed
            }
        );
        assert!(matches!(
            from_ledger(stale(OrderStatus::Confirmed), ORDER, Some(OrderStatus::Confirmed)),
            TransitionError::IllegalTransition(_)
        ));
    }

    #[test]
    fn test_actions_for_shipped_order() {
        let actions = available_actions(OrderStatus::Shipped);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].label, "Deliver");
        assert!(!actions[0].adjusts_inventory);
        assert_eq!(actions[1].label, "Return");
        assert!(actions[1].adjusts_inventory);
        assert!(available_actions(OrderStatus::Delivered).is_empty());
    }

    #[test]
    fn test_response_for_failure_keeps_status() {
        let result = Err(TransitionError::IllegalTransition(IllegalTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipped,
        }));
        let response = TransitionResponse::from_result(ORDER, &result);
        assert!(!response.success);
        assert_eq!(response.old_status, Some(OrderStatus::Pending));
        assert_eq!(response.new_status, Some(OrderStatus::Pending));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["orderId"], 42);
        assert_eq!(json["inventoryAdjusted"], false);
    }
}
