//! Order commands.

use chrono::Utc;
use common::{AggregateId, Money, UserId};

use crate::command::Command;

use super::{Order, OrderError, OrderLine, OrderStatus, PaymentMethod, ShippingAddress, generate_order_number};

/// Command to place an order whose stock has already been reserved.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub order_number: String,
    pub lines: Vec<OrderLine>,
    pub delivery_charge: Money,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
}

impl PlaceOrder {
    /// Creates a PlaceOrder command with a fresh id and order number.
    pub fn new(
        user_id: UserId,
        lines: Vec<OrderLine>,
        delivery_charge: Money,
        payment_method: PaymentMethod,
        shipping_address: ShippingAddress,
    ) -> Self {
        Self {
            order_id: AggregateId::new(),
            user_id,
            order_number: generate_order_number(Utc::now()),
            lines,
            delivery_charge,
            payment_method,
            shipping_address,
        }
    }

    /// Sum of line subtotals, before delivery.
    pub fn subtotal(&self) -> Result<Money, OrderError> {
        Money::checked_sum(self.lines.iter().map(|line| line.subtotal)).ok_or_else(|| {
            OrderError::AmountOverflow {
                what: "order subtotal".to_string(),
            }
        })
    }

    /// Subtotal plus delivery charge.
    pub fn total_amount(&self) -> Result<Money, OrderError> {
        self.subtotal()?
            .checked_add(self.delivery_charge)
            .ok_or_else(|| OrderError::AmountOverflow {
                what: "order total".to_string(),
            })
    }
}

impl Command for PlaceOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to move an order to another lifecycle state.
#[derive(Debug, Clone)]
pub struct UpdateOrderStatus {
    pub order_id: AggregateId,
    pub status: OrderStatus,
}

impl UpdateOrderStatus {
    pub fn new(order_id: AggregateId, status: OrderStatus) -> Self {
        Self { order_id, status }
    }
}

impl Command for UpdateOrderStatus {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}
