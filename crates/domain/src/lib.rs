//! Domain layer for the storefront core.
//!
//! This crate provides:
//! - the Aggregate trait and a command handler that persists aggregates as
//!   versioned documents
//! - the Cart aggregate and a service that retries conflicting saves
//! - the Order aggregate with its lifecycle state machine
//! - the delivery charge calculator

pub mod aggregate;
pub mod cart;
pub mod command;
pub mod error;
pub mod order;
pub mod pricing;

pub use aggregate::{Aggregate, DomainEvent};
pub use cart::{Cart, CartError, CartEvent, CartLine, CartService};
pub use command::{Command, CommandHandler, CommandResult};
pub use common::{AggregateId, Money, ProductId, UserId, VariantId};
pub use error::DomainError;
pub use order::{
    Order, OrderError, OrderEvent, OrderLine, OrderService, OrderStatus, PaymentMethod,
    PaymentStatus, PlaceOrder, ShippingAddress, StatusChange, UpdateOrderStatus,
    generate_order_number,
};
pub use pricing::{DeliverySettings, DeliverySlab, MAX_DELIVERY_DISTANCE_KM, delivery_charge};
