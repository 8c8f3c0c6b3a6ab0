//! Order service providing a simplified API for order operations.

use common::{AggregateId, UserId};
use store::DocumentStore;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{Order, OrderError, OrderEvent, PlaceOrder, UpdateOrderStatus};

/// Service for managing orders.
///
/// Stock is not this service's concern: callers reserve before `place` and
/// release before cancelling. Order writes are not retried; a lost version
/// race surfaces as `ConcurrentModification`.
pub struct OrderService<S: DocumentStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: DocumentStore> OrderService<S> {
    /// Creates a new order service with the given document store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    /// Places a new order.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, user_id = %cmd.user_id))]
    pub async fn place(&self, cmd: PlaceOrder) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .handler
            .execute(cmd.order_id, |order| order.place(&cmd))
            .await?;
        tracing::info!(
            order_number = result.aggregate.order_number(),
            total = %result.aggregate.total_amount(),
            "order placed"
        );
        Ok(result)
    }

    /// Loads an order by ID, returning None if it doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(order_id).await
    }

    /// Loads an order by ID or fails with `NotFound`.
    pub async fn require(&self, order_id: AggregateId) -> Result<Order, DomainError> {
        self.get(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))
    }

    /// Lists a user's orders, newest first, leaving out the ones they hid.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, DomainError> {
        let orders = self.handler.list_by_owner(user_id).await?;
        Ok(orders
            .into_iter()
            .filter(|order| !order.is_hidden_for_user())
            .collect())
    }

    /// Lists every order, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Order>, DomainError> {
        self.handler.list().await
    }

    /// Moves an order to a non-cancelled lifecycle state.
    ///
    /// Cancellation has stock side effects and must go through the checkout
    /// coordinator, so `CANCELLED` is rejected here.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        cmd: UpdateOrderStatus,
    ) -> Result<CommandResult<Order>, DomainError> {
        if cmd.status == super::OrderStatus::Cancelled {
            return Err(DomainError::validation(
                "cancellation must release stock; use the cancel operation",
            ));
        }
        self.require(cmd.order_id).await?;
        self.handler
            .execute(cmd.order_id, |order| order.update_status(cmd.status))
            .await
    }

    /// Hides a delivered or cancelled order from its owner's listing.
    #[tracing::instrument(skip(self))]
    pub async fn hide_for_user(
        &self,
        order_id: AggregateId,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.require(order_id).await?;
        self.handler
            .execute(order_id, |order| order.hide_for_user())
            .await
    }

    /// Runs a command against an order the caller already loaded and checked.
    pub async fn execute_on<F>(
        &self,
        order: Order,
        command_fn: F,
    ) -> Result<CommandResult<Order>, DomainError>
    where
        F: FnOnce(&Order) -> Result<Vec<OrderEvent>, OrderError>,
    {
        let order_id = crate::aggregate::Aggregate::id(&order).ok_or(OrderError::NotPlaced)?;
        self.handler.execute_on(order_id, order, command_fn).await
    }
}
