//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod status;
mod value_objects;

pub use aggregate::Order;
pub use commands::{PlaceOrder, UpdateOrderStatus};
pub use events::{
    OrderCancelledData, OrderEvent, OrderPlacedData, PaymentIntentOpenedData, PaymentRecordedData,
    StatusChangedData,
};
pub use service::OrderService;
pub use status::{OrderStatus, PaymentMethod, PaymentStatus};
pub use value_objects::{OrderLine, ShippingAddress, StatusChange, generate_order_number};

use common::{Money, ProductId};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The lifecycle table does not allow this move.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Only delivered or cancelled orders can be hidden.
    #[error("Order in {status} state cannot be hidden")]
    NotHideable { status: OrderStatus },

    /// The payment was already recorded.
    #[error("Order is already paid")]
    AlreadyPaid,

    /// Order has no lines.
    #[error("Order has no items")]
    NoLines,

    /// A line has a zero quantity.
    #[error("Invalid quantity for {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId },

    #[error("Delivery charge must not be negative: {0}")]
    NegativeDeliveryCharge(Money),

    /// A required shipping address field is blank.
    #[error("Shipping address is missing {field}")]
    IncompleteAddress { field: &'static str },

    /// A line subtotal or the order total does not fit in a money amount.
    #[error("Amount out of range: {what}")]
    AmountOverflow { what: String },

    /// Order is already created.
    #[error("Order already created")]
    AlreadyCreated,

    /// The command targets an order that was never placed.
    #[error("Order has not been placed")]
    NotPlaced,
}
