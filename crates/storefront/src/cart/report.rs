//! What the engine tells the customer after changing their cart.

use mercato_core::{ProductId, Reconciliation};
use serde::{Deserialize, Serialize};

/// Result of a quantity update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// Quantity zero: the item was removed.
    Removed,
    Applied {
        quantity: u32,
    },
    /// Only part of the request is in stock; the quantity was reduced.
    Clamped {
        requested: u32,
        applied: u32,
        reason: String,
    },
    /// The product is gone; it will be dropped on the next validation.
    Unavailable {
        reason: String,
    },
    /// The oracle could not be reached; the quantity was applied unchecked.
    Unverified {
        quantity: u32,
    },
}

impl From<Reconciliation> for UpdateOutcome {
    fn from(value: Reconciliation) -> Self {
        match value {
            Reconciliation::Applied { quantity } => Self::Applied { quantity },
            Reconciliation::Clamped {
                requested,
                applied,
                reason,
            } => Self::Clamped {
                requested,
                applied,
                reason,
            },
            Reconciliation::Unavailable { reason } => Self::Unavailable { reason },
        }
    }
}

impl UpdateOutcome {
    /// Notice to show the customer, if any.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Removed | Self::Applied { .. } => None,
            Self::Clamped {
                applied, reason, ..
            } => Some(format!("{reason}. Quantity reduced to {applied}.")),
            Self::Unavailable { reason } => Some(reason.clone()),
            Self::Unverified { .. } => {
                Some("We could not confirm stock right now; availability is checked again at checkout.".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedItem {
    pub product_id: ProductId,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClampedItem {
    pub product_id: ProductId,
    pub name: String,
    pub requested: u32,
    pub applied: u32,
}

/// Everything a full cart validation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub removed: Vec<RemovedItem>,
    pub clamped: Vec<ClampedItem>,
    /// Items whose price differs from what the customer last acknowledged.
    pub price_changed: Vec<ProductId>,
    /// Items left untouched because the oracle could not be reached.
    pub unverified: Vec<ProductId>,
}

impl ValidationReport {
    /// Nothing was dropped or resized.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.removed.is_empty() && self.clamped.is_empty()
    }

    /// Customer-facing summary lines.
    #[must_use]
    pub fn notices(&self) -> Vec<String> {
        let mut notices = Vec::new();

        match self.removed.len() {
            0 => {}
            1 => notices.push("1 item removed".to_string()),
            n => notices.push(format!("{n} items removed")),
        }

        for item in &self.clamped {
            notices.push(format!(
                "{}: quantity reduced from {} to {}",
                item.name, item.requested, item.applied
            ));
        }

        if !self.price_changed.is_empty() {
            notices.push("Some prices have changed since you added them".to_string());
        }

        if !self.unverified.is_empty() {
            notices.push(
                "Stock could not be confirmed for some items; it is checked again at checkout"
                    .to_string(),
            );
        }

        notices
    }
}
