//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, Money, UserId};
use serde::{Deserialize, Serialize};
use store::Version;

use crate::aggregate::Aggregate;

use super::{
    OrderError, OrderEvent, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, PlaceOrder,
    ShippingAddress, StatusChange, events::OrderPlacedData,
};

/// Order aggregate root.
///
/// Lines, delivery charge and total are frozen when the order is placed. After
/// that only the lifecycle status, the payment fields and the hidden flag change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,

    user_id: Option<UserId>,

    order_number: String,

    lines: Vec<OrderLine>,

    delivery_charge: Money,

    total_amount: Money,

    payment_method: PaymentMethod,

    status: OrderStatus,

    payment_status: PaymentStatus,

    gateway_order_id: Option<String>,

    payment_id: Option<String>,

    payment_signature: Option<String>,

    shipping_address: ShippingAddress,

    hidden_for_user: bool,

    created_at: Option<DateTime<Utc>>,

    updated_at: Option<DateTime<Utc>>,

    status_history: Vec<StatusChange>,

    #[serde(skip)]
    version: Version,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn owner(&self) -> Option<UserId> {
        self.user_id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => self.apply_placed(data),
            OrderEvent::PaymentIntentOpened(data) => {
                self.payment_method = PaymentMethod::Gateway;
                self.payment_status = PaymentStatus::Pending;
                self.gateway_order_id = Some(data.gateway_order_id);
                self.move_to(OrderStatus::PaymentPending, data.opened_at);
            }
            OrderEvent::PaymentRecorded(data) => {
                self.payment_status = PaymentStatus::Paid;
                self.payment_id = Some(data.payment_id);
                self.payment_signature = Some(data.signature);
                self.move_to(OrderStatus::Paid, data.paid_at);
            }
            OrderEvent::PaymentFailed { failed_at } => {
                self.payment_status = PaymentStatus::Failed;
                self.updated_at = Some(failed_at);
            }
            OrderEvent::StatusChanged(data) => self.move_to(data.to, data.changed_at),
            OrderEvent::OrderCancelled(data) => {
                if data.refund_due {
                    self.payment_status = PaymentStatus::Refunded;
                }
                self.move_to(OrderStatus::Cancelled, data.cancelled_at);
            }
            OrderEvent::HiddenForUser { hidden_at } => {
                self.hidden_for_user = true;
                self.updated_at = Some(hidden_at);
            }
        }
    }
}

impl Order {
    fn apply_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.user_id = Some(data.user_id);
        self.order_number = data.order_number;
        self.lines = data.lines;
        self.delivery_charge = data.delivery_charge;
        self.total_amount = data.total_amount;
        self.payment_method = data.payment_method;
        self.status = data.status;
        self.payment_status = PaymentStatus::Pending;
        self.shipping_address = data.shipping_address;
        self.created_at = Some(data.placed_at);
        self.updated_at = Some(data.placed_at);
        self.status_history = vec![StatusChange {
            status: data.status,
            at: data.placed_at,
        }];
    }

    fn move_to(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        if self.status != status {
            self.status = status;
            self.status_history.push(StatusChange { status, at });
        }
        self.updated_at = Some(at);
    }
}

// Query methods
impl Order {
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Sum of line subtotals, before delivery.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(|line| line.subtotal).sum()
    }

    pub fn delivery_charge(&self) -> Money {
        self.delivery_charge
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn gateway_order_id(&self) -> Option<&str> {
        self.gateway_order_id.as_deref()
    }

    pub fn payment_id(&self) -> Option<&str> {
        self.payment_id.as_deref()
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn is_hidden_for_user(&self) -> bool {
        self.hidden_for_user
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn status_history(&self) -> &[StatusChange] {
        &self.status_history
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == Some(user_id)
    }
}

// Command methods (return events)
impl Order {
    /// Places the order. Stock for every line must already be reserved.
    pub fn place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyCreated);
        }
        if cmd.lines.is_empty() {
            return Err(OrderError::NoLines);
        }
        if let Some(line) = cmd.lines.iter().find(|line| line.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: line.product_id.clone(),
            });
        }
        if cmd.delivery_charge.is_negative() {
            return Err(OrderError::NegativeDeliveryCharge(cmd.delivery_charge));
        }
        cmd.shipping_address.validate()?;
        if let Some(line) = cmd
            .lines
            .iter()
            .find(|line| line.unit_price.checked_times(line.quantity) != Some(line.subtotal))
        {
            return Err(OrderError::AmountOverflow {
                what: format!("subtotal for {}", line.product_id),
            });
        }
        let total_amount = cmd.total_amount()?;

        Ok(vec![OrderEvent::OrderPlaced(OrderPlacedData {
            order_id: cmd.order_id,
            user_id: cmd.user_id,
            order_number: cmd.order_number.clone(),
            lines: cmd.lines.clone(),
            delivery_charge: cmd.delivery_charge,
            total_amount,
            payment_method: cmd.payment_method,
            status: cmd.payment_method.initial_status(),
            shipping_address: cmd.shipping_address.clone(),
            placed_at: Utc::now(),
        })])
    }

    /// Attaches a gateway payment order and moves to `PAYMENT_PENDING`.
    ///
    /// Allowed from `CREATED`, `PAYMENT_PENDING` and, as a recovery path whose
    /// stock the caller has re-reserved, `CANCELLED`.
    pub fn open_payment_intent(
        &self,
        gateway_order_id: &str,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.accepts_payment_intent() {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::PaymentPending,
            });
        }
        Ok(vec![OrderEvent::payment_intent_opened(gateway_order_id)])
    }

    /// Returns true if a payment intent may be opened in the current state.
    pub fn accepts_payment_intent(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Created | OrderStatus::PaymentPending | OrderStatus::Cancelled
        )
    }

    /// Records a verified gateway payment and moves to `PAID`.
    pub fn record_payment(
        &self,
        payment_id: &str,
        signature: &str,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if self.payment_status == PaymentStatus::Paid {
            return Err(OrderError::AlreadyPaid);
        }
        if !self.status.can_transition_to(OrderStatus::Paid) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Paid,
            });
        }
        Ok(vec![OrderEvent::payment_recorded(payment_id, signature)])
    }

    /// Marks the payment as failed. A paid order is never downgraded.
    pub fn fail_payment(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if matches!(
            self.payment_status,
            PaymentStatus::Paid | PaymentStatus::Failed | PaymentStatus::Refunded
        ) {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::payment_failed()])
    }

    /// Moves the order along the lifecycle. Setting the current status is a no-op.
    ///
    /// `PAYMENT_PENDING` and `PAID` are only entered through
    /// [`Order::open_payment_intent`] and [`Order::record_payment`], which carry
    /// the gateway ids; asking for them here is an invalid transition.
    pub fn update_status(&self, to: OrderStatus) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if to == OrderStatus::Cancelled {
            return self.cancel();
        }
        if to == self.status {
            return Ok(vec![]);
        }
        if to.is_payment_driven() {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status.ensure_transition(to)?;
        Ok(vec![OrderEvent::status_changed(self.status, to)])
    }

    /// Cancels the order. The caller releases the reserved stock first.
    pub fn cancel(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Cancelled,
            });
        }
        Ok(vec![OrderEvent::order_cancelled(
            self.status,
            self.payment_status == PaymentStatus::Paid,
        )])
    }

    /// Hides a finished order from its owner's history.
    pub fn hide_for_user(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.status.is_terminal() {
            return Err(OrderError::NotHideable {
                status: self.status,
            });
        }
        if self.hidden_for_user {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::hidden_for_user()])
    }

    fn ensure_placed(&self) -> Result<(), OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotPlaced);
        }
        Ok(())
    }
}
