//! Checkout coordination for the storefront.
//!
//! This crate owns every flow that touches stock and order lifecycle together:
//! 1. Place an order: price lines, compute delivery, reserve stock, save
//! 2. Open a payment intent with the gateway (reviving a cancelled order if needed)
//! 3. Verify the gateway's signed payment confirmation
//! 4. Cancel an order and release its stock
//!
//! Stock reservation is all-or-nothing: if any line cannot be reserved, lines
//! already reserved are released before the error is returned.

pub mod access;
pub mod coordinator;
pub mod error;
pub mod payment;
pub mod reservation;
pub mod services;

pub use access::{Caller, Role};
pub use coordinator::{
    CheckoutService, CreateOrderRequest, OrderItemRequest, PaymentIntent, VerifyPaymentRequest,
};
pub use error::{CheckoutError, Result};
pub use payment::PaymentSigner;
pub use reservation::StockReservation;
pub use services::{
    GatewayOrder, InMemoryPaymentGateway, InMemorySettingsProvider, LoggingDispatcher,
    Notification, NotificationDispatcher, NotificationOutbox, PaymentGateway,
    RecordingDispatcher, SettingsProvider,
};
