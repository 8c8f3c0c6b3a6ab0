//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use common::Money;
use serde::{Deserialize, Serialize};

use crate::error::CheckoutError;

/// A payment order opened with the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
}

/// Trait for the hosted payment gateway.
///
/// Only intent creation goes over the wire. Payment confirmations are
/// verified locally with the shared secret.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, CheckoutError>;
}

#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, CheckoutError> {
        (**self)
            .create_payment_intent(amount, currency, receipt)
            .await
    }
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    /// Gateway order id to receipt.
    orders: HashMap<String, String>,
    next_id: u32,
    fail_on_create: bool,
}

/// In-memory payment gateway for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, InMemoryGatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures the gateway to reject intent creation.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state().fail_on_create = fail;
    }

    /// Returns the number of payment orders opened.
    pub fn order_count(&self) -> usize {
        self.state().orders.len()
    }

    /// Returns the receipt a gateway order was opened with.
    pub fn receipt_of(&self, gateway_order_id: &str) -> Option<String> {
        self.state().orders.get(gateway_order_id).cloned()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, CheckoutError> {
        let mut state = self.state();

        if state.fail_on_create {
            return Err(CheckoutError::Gateway(
                "payment order creation declined".to_string(),
            ));
        }

        state.next_id += 1;
        let id = format!("order_{:06}", state.next_id);
        state.orders.insert(id.clone(), receipt.to_string());

        Ok(GatewayOrder {
            id,
            amount: amount.minor(),
            currency: currency.to_string(),
        })
    }
}
