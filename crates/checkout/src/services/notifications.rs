//! Outbound customer notifications.
//!
//! Checkout flows never wait on delivery: they push a [`Notification`] onto
//! the [`NotificationOutbox`] and move on. A background worker drains the
//! queue into a [`NotificationDispatcher`]. Delivery is at-most-once; a full
//! queue or a failed dispatch is logged and the notification is dropped.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use common::{AggregateId, Money, UserId};
use domain::{Order, OrderStatus};
use serde::Serialize;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

use crate::error::CheckoutError;

/// Default outbox capacity.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    OrderPlaced {
        order_id: AggregateId,
        order_number: String,
        user_id: UserId,
        total_amount: Money,
    },
    PaymentReceived {
        order_id: AggregateId,
        order_number: String,
        user_id: UserId,
        payment_id: String,
        amount: Money,
    },
    OrderCancelled {
        order_id: AggregateId,
        order_number: String,
        user_id: UserId,
        refund_due: bool,
    },
    StatusChanged {
        order_id: AggregateId,
        order_number: String,
        user_id: UserId,
        from: OrderStatus,
        to: OrderStatus,
    },
}

impl Notification {
    pub fn order_placed(order_id: AggregateId, user_id: UserId, order: &Order) -> Self {
        Notification::OrderPlaced {
            order_id,
            order_number: order.order_number().to_string(),
            user_id,
            total_amount: order.total_amount(),
        }
    }

    pub fn payment_received(
        order_id: AggregateId,
        user_id: UserId,
        order: &Order,
        payment_id: &str,
    ) -> Self {
        Notification::PaymentReceived {
            order_id,
            order_number: order.order_number().to_string(),
            user_id,
            payment_id: payment_id.to_string(),
            amount: order.total_amount(),
        }
    }

    pub fn order_cancelled(
        order_id: AggregateId,
        user_id: UserId,
        order: &Order,
        refund_due: bool,
    ) -> Self {
        Notification::OrderCancelled {
            order_id,
            order_number: order.order_number().to_string(),
            user_id,
            refund_due,
        }
    }

    pub fn status_changed(
        order_id: AggregateId,
        user_id: UserId,
        order: &Order,
        from: OrderStatus,
    ) -> Self {
        Notification::StatusChanged {
            order_id,
            order_number: order.order_number().to_string(),
            user_id,
            from,
            to: order.status(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::OrderPlaced { .. } => "order_placed",
            Notification::PaymentReceived { .. } => "payment_received",
            Notification::OrderCancelled { .. } => "order_cancelled",
            Notification::StatusChanged { .. } => "status_changed",
        }
    }

    pub fn order_id(&self) -> AggregateId {
        match self {
            Notification::OrderPlaced { order_id, .. }
            | Notification::PaymentReceived { order_id, .. }
            | Notification::OrderCancelled { order_id, .. }
            | Notification::StatusChanged { order_id, .. } => *order_id,
        }
    }
}

/// Delivers a notification to its recipient (email, SMS, push).
#[async_trait]
pub trait NotificationDispatcher: Send + Sync + 'static {
    async fn dispatch(&self, notification: &Notification) -> Result<(), CheckoutError>;
}

/// Writes notifications to the log. Used when no real channel is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingDispatcher {
    async fn dispatch(&self, notification: &Notification) -> Result<(), CheckoutError> {
        tracing::info!(
            kind = notification.kind(),
            order_id = %notification.order_id(),
            "notification dispatched"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    delivered: Vec<Notification>,
    fail: bool,
}

/// Keeps every delivered notification in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    state: Arc<Mutex<RecordingState>>,
    delivered: Arc<Notify>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every following dispatch fail.
    pub fn set_fail(&self, fail: bool) {
        self.state().fail = fail;
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.state().delivered.clone()
    }

    /// Waits until at least `count` notifications were delivered.
    pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
        loop {
            let notified = self.delivered.notified();
            let delivered = self.delivered();
            if delivered.len() >= count {
                return delivered;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, notification: &Notification) -> Result<(), CheckoutError> {
        {
            let mut state = self.state();
            if state.fail {
                return Err(CheckoutError::Gateway("notification channel down".to_string()));
            }
            state.delivered.push(notification.clone());
        }
        self.delivered.notify_waiters();
        Ok(())
    }
}

/// Sending half of the notification queue.
#[derive(Debug, Clone)]
pub struct NotificationOutbox {
    tx: mpsc::Sender<Notification>,
}

impl NotificationOutbox {
    /// Starts the delivery worker and returns the outbox feeding it.
    ///
    /// The worker stops once every outbox clone is dropped and the queue is
    /// drained.
    pub fn spawn<D: NotificationDispatcher>(
        dispatcher: D,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(dispatcher, rx));
        (Self { tx }, worker)
    }

    /// Queues a notification without waiting. Never fails the caller.
    pub fn send(&self, notification: Notification) {
        let kind = notification.kind();
        let order_id = notification.order_id();
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(kind, %order_id, "notification queue full, dropping");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!(kind, %order_id, "notification worker stopped, dropping");
            }
        }
    }
}

async fn run_worker<D: NotificationDispatcher>(
    dispatcher: D,
    mut rx: mpsc::Receiver<Notification>,
) {
    tracing::debug!("notification worker started");
    while let Some(notification) = rx.recv().await {
        if let Err(e) = dispatcher.dispatch(&notification).await {
            metrics::counter!("notification_failures_total").increment(1);
            tracing::error!(
                kind = notification.kind(),
                order_id = %notification.order_id(),
                error = %e,
                "notification delivery failed"
            );
        }
    }
    tracing::debug!("notification worker stopped");
}
