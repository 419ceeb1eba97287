//! Order lifecycle status and the transition table.
//!
//! ```text
//! Pending ──► Confirmed ──► Processing ──► Shipped ──► Delivered
//!    │            │              │            │
//!    └────────────┴──────┬───────┘            └──► Returned
//!                        ▼
//!                    Cancelled
//! ```
//!
//! `Delivered`, `Cancelled` and `Returned` are terminal. Entering `Confirmed`
//! commits stock; cancelling an order that already committed stock, or
//! returning a shipped one, releases it.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

/// Inventory side effect implied by a legal status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryEffect {
    /// Status changes without touching stock.
    None,
    /// Decrement stock by every line quantity, all-or-nothing.
    Commit,
    /// Increment stock by every line quantity.
    Release,
}

impl InventoryEffect {
    /// Whether this effect touches the inventory ledger.
    #[must_use]
    pub const fn adjusts_inventory(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// A requested status is not reachable from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal transition from {from} to {to}")]
pub struct IllegalTransition {
    /// Status the order is currently in.
    pub from: OrderStatus,
    /// Status that was requested.
    pub to: OrderStatus,
}

/// Error parsing an [`OrderStatus`] from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid order status: {0}")]
pub struct StatusParseError(pub String);

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Confirmed,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::Returned,
    ];

    /// Statuses reachable in one step from `self`.
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Confirmed, Self::Cancelled],
            Self::Confirmed => &[Self::Processing, Self::Cancelled],
            Self::Processing => &[Self::Shipped, Self::Cancelled],
            Self::Shipped => &[Self::Delivered, Self::Returned],
            Self::Delivered | Self::Cancelled | Self::Returned => &[],
        }
    }

    /// Whether `next` is reachable in one step from `self`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Terminal statuses have no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Returned)
    }

    /// Whether an order in this status holds committed stock.
    #[must_use]
    pub const fn holds_stock(self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::Processing | Self::Shipped | Self::Delivered
        )
    }

    /// Validate a transition and return the inventory effect it implies.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] if `next` is not in the transition table
    /// for `self`.
    pub fn transition_to(self, next: Self) -> Result<InventoryEffect, IllegalTransition> {
        if !self.can_transition_to(next) {
            return Err(IllegalTransition {
                from: self,
                to: next,
            });
        }

        let effect = match (self, next) {
            (Self::Pending, Self::Confirmed) => InventoryEffect::Commit,
            (from, Self::Cancelled) if from.holds_stock() => InventoryEffect::Release,
            (Self::Shipped, Self::Returned) => InventoryEffect::Release,
            _ => InventoryEffect::None,
        };

        Ok(effect)
    }

    /// Staff-facing verb for the action that moves an order into this status.
    ///
    /// `Pending` is only ever the initial status, so it has none.
    #[must_use]
    pub const fn action_label(self) -> Option<&'static str> {
        match self {
            Self::Pending => None,
            Self::Confirmed => Some("Confirm"),
            Self::Processing => Some("Process"),
            Self::Shipped => Some("Ship"),
            Self::Delivered => Some("Deliver"),
            Self::Cancelled => Some("Cancel"),
            Self::Returned => Some("Return"),
        }
    }

    /// Canonical name, as used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Returned => "Returned",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| StatusParseError(s.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table_matches_lifecycle() {
        use OrderStatus::*;

        let expected: [(OrderStatus, &[OrderStatus]); 7] = [
            (Pending, &[Confirmed, Cancelled]),
            (Confirmed, &[Processing, Cancelled]),
            (Processing, &[Shipped, Cancelled]),
            (Shipped, &[Delivered, Returned]),
            (Delivered, &[]),
            (Cancelled, &[]),
            (Returned, &[]),
        ];

        for (from, allowed) in expected {
            for to in OrderStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&to),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for status in OrderStatus::ALL {
            assert_eq!(status.is_terminal(), status.allowed_transitions().is_empty());
        }
    }

    #[test]
    fn test_every_reachable_status_has_a_label() {
        for from in OrderStatus::ALL {
            for next in from.allowed_transitions() {
                assert!(next.action_label().is_some(), "{from} -> {next}");
            }
        }
        assert_eq!(OrderStatus::Pending.action_label(), None);
    }

    #[test]
    fn test_skipping_ahead_is_illegal() {
        let err = OrderStatus::Pending
            .transition_to(OrderStatus::Shipped)
            .unwrap_err();
        assert_eq!(err.from, OrderStatus::Pending);
        assert_eq!(err.to, OrderStatus::Shipped);
        assert_eq!(err.to_string(), "illegal transition from Pending to Shipped");
    }

    #[test]
    fn test_side_exits_never_reach_each_other() {
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Returned));
        assert!(!OrderStatus::Returned.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Returned));
    }

    #[test]
    fn test_inventory_effects() {
        use OrderStatus::*;

        assert_eq!(Pending.transition_to(Confirmed).unwrap(), InventoryEffect::Commit);
        assert_eq!(Pending.transition_to(Cancelled).unwrap(), InventoryEffect::None);
        assert_eq!(Confirmed.transition_to(Cancelled).unwrap(), InventoryEffect::Release);
        assert_eq!(Processing.transition_to(Cancelled).unwrap(), InventoryEffect::Release);
        assert_eq!(Shipped.transition_to(Returned).unwrap(), InventoryEffect::Release);
        assert_eq!(Confirmed.transition_to(Processing).unwrap(), InventoryEffect::None);
        assert_eq!(Processing.transition_to(Shipped).unwrap(), InventoryEffect::None);
        assert_eq!(Shipped.transition_to(Delivered).unwrap(), InventoryEffect::None);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("confirmed".parse::<OrderStatus>().unwrap(), OrderStatus::Confirmed);
        assert_eq!(" Shipped ".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert!("Lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_canonical_names() {
        let json = serde_json::to_string(&OrderStatus::Processing).unwrap();
        assert_eq!(json, "\"Processing\"");
    }
}
