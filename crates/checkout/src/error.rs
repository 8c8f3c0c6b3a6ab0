//! Checkout error types.

use common::AggregateId;
use domain::DomainError;
use thiserror::Error;

/// Errors that can occur during checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A domain rule or store operation failed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The payment confirmation did not match the order or its signature.
    #[error("Invalid payment signature for order {order_id}")]
    InvalidPaymentSignature { order_id: AggregateId },

    /// The caller may not act on this order.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The payment gateway rejected or failed a call.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// The settings provider failed.
    #[error("Settings provider error: {0}")]
    Settings(String),
}

impl CheckoutError {
    pub fn validation(message: impl Into<String>) -> Self {
        CheckoutError::Domain(DomainError::validation(message))
    }
}

impl From<store::StoreError> for CheckoutError {
    fn from(e: store::StoreError) -> Self {
        CheckoutError::Domain(e.into())
    }
}

impl From<domain::OrderError> for CheckoutError {
    fn from(e: domain::OrderError) -> Self {
        CheckoutError::Domain(e.into())
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
