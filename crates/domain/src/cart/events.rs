//! Cart domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, Money, ProductId, UserId, VariantId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::CartLine;

/// Events that can occur on a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    /// The user's cart was created by its first mutation.
    CartOpened(CartOpenedData),

    /// A new line was added.
    LineAdded(CartLine),

    /// An existing line changed quantity; the unit price is refreshed.
    LineQuantityChanged(LineQuantityChangedData),

    /// A line was removed.
    LineRemoved(LineRemovedData),

    /// Every line was removed.
    CartCleared { cleared_at: DateTime<Utc> },
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened(_) => "CartOpened",
            CartEvent::LineAdded(_) => "LineAdded",
            CartEvent::LineQuantityChanged(_) => "LineQuantityChanged",
            CartEvent::LineRemoved(_) => "LineRemoved",
            CartEvent::CartCleared { .. } => "CartCleared",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartOpenedData {
    pub cart_id: AggregateId,
    pub user_id: UserId,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineQuantityChangedData {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    pub unit_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRemovedData {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
}

impl CartEvent {
    pub fn cart_opened(cart_id: AggregateId, user_id: UserId) -> Self {
        CartEvent::CartOpened(CartOpenedData {
            cart_id,
            user_id,
            opened_at: Utc::now(),
        })
    }

    pub fn line_quantity_changed(line: &CartLine, quantity: u32, unit_price: Money) -> Self {
        CartEvent::LineQuantityChanged(LineQuantityChangedData {
            product_id: line.product_id.clone(),
            variant_id: line.variant_id.clone(),
            quantity,
            unit_price,
        })
    }

    pub fn line_removed(line: &CartLine) -> Self {
        CartEvent::LineRemoved(LineRemovedData {
            product_id: line.product_id.clone(),
            variant_id: line.variant_id.clone(),
        })
    }

    pub fn cart_cleared() -> Self {
        CartEvent::CartCleared {
            cleared_at: Utc::now(),
        }
    }
}
