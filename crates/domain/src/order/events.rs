//! Order domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, Money, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{OrderLine, OrderStatus, PaymentMethod, ShippingAddress};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was placed with its stock already reserved.
    OrderPlaced(OrderPlacedData),

    /// A gateway payment order was created for this order.
    PaymentIntentOpened(PaymentIntentOpenedData),

    /// The gateway payment was verified.
    PaymentRecorded(PaymentRecordedData),

    /// A payment verification was rejected.
    PaymentFailed { failed_at: DateTime<Utc> },

    /// Lifecycle moved forward.
    StatusChanged(StatusChangedData),

    /// Order was cancelled and its stock released.
    OrderCancelled(OrderCancelledData),

    /// The customer hid the order from their own history.
    HiddenForUser { hidden_at: DateTime<Utc> },
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::PaymentIntentOpened(_) => "PaymentIntentOpened",
            OrderEvent::PaymentRecorded(_) => "PaymentRecorded",
            OrderEvent::PaymentFailed { .. } => "PaymentFailed",
            OrderEvent::StatusChanged(_) => "StatusChanged",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::HiddenForUser { .. } => "HiddenForUser",
        }
    }
}

/// Data for OrderPlaced event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub order_number: String,
    pub lines: Vec<OrderLine>,
    pub delivery_charge: Money,
    /// Line subtotals plus the delivery charge.
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub placed_at: DateTime<Utc>,
}

/// Data for PaymentIntentOpened event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentOpenedData {
    pub gateway_order_id: String,
    pub opened_at: DateTime<Utc>,
}

/// Data for PaymentRecorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecordedData {
    pub payment_id: String,
    pub signature: String,
    pub paid_at: DateTime<Utc>,
}

/// Data for StatusChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

/// Data for OrderCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub from: OrderStatus,
    /// True when the order had been paid, so the payment is now owed back.
    pub refund_due: bool,
    pub cancelled_at: DateTime<Utc>,
}

// Convenience constructors for events
impl OrderEvent {
    pub fn payment_intent_opened(gateway_order_id: impl Into<String>) -> Self {
        OrderEvent::PaymentIntentOpened(PaymentIntentOpenedData {
            gateway_order_id: gateway_order_id.into(),
            opened_at: Utc::now(),
        })
    }

    pub fn payment_recorded(payment_id: impl Into<String>, signature: impl Into<String>) -> Self {
        OrderEvent::PaymentRecorded(PaymentRecordedData {
            payment_id: payment_id.into(),
            signature: signature.into(),
            paid_at: Utc::now(),
        })
    }

    pub fn payment_failed() -> Self {
        OrderEvent::PaymentFailed {
            failed_at: Utc::now(),
        }
    }

    pub fn status_changed(from: OrderStatus, to: OrderStatus) -> Self {
        OrderEvent::StatusChanged(StatusChangedData {
            from,
            to,
            changed_at: Utc::now(),
        })
    }

    pub fn order_cancelled(from: OrderStatus, refund_due: bool) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            from,
            refund_due,
            cancelled_at: Utc::now(),
        })
    }

    pub fn hidden_for_user() -> Self {
        OrderEvent::HiddenForUser {
            hidden_at: Utc::now(),
        }
    }
}
