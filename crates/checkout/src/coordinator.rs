//! Checkout coordinator: the flows that span stock, orders, carts and payments.

use std::collections::HashMap;
use std::time::Instant;

use common::{AggregateId, Money, ProductId, UserId, VariantId};
use domain::{
    Aggregate, CartService, DomainError, Order, OrderLine, OrderService, OrderStatus,
    PaymentMethod, PaymentStatus, PlaceOrder, ShippingAddress, UpdateOrderStatus,
    delivery_charge,
};
use serde::{Deserialize, Serialize};
use store::{CatalogStore, DocumentStore};

use crate::access::Caller;
use crate::error::{CheckoutError, Result};
use crate::payment::PaymentSigner;
use crate::reservation::StockReservation;
use crate::services::{Notification, NotificationOutbox, PaymentGateway, SettingsProvider};

/// One requested order item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub distance_km: f64,
    /// Charge to use when no delivery slab applies.
    #[serde(default)]
    pub delivery_charge: Option<Money>,
}

/// A signed payment confirmation relayed from the gateway's checkout page.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: AggregateId,
    #[serde(default)]
    pub gateway_order_id: String,
    #[serde(default)]
    pub payment_id: String,
    #[serde(default)]
    pub signature: String,
}

impl VerifyPaymentRequest {
    fn validate(&self) -> Result<()> {
        let fields = [
            ("gateway_order_id", &self.gateway_order_id),
            ("payment_id", &self.payment_id),
            ("signature", &self.signature),
        ];
        match fields.into_iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(CheckoutError::validation(format!("{field} is required"))),
            None => Ok(()),
        }
    }
}

/// What the client needs to open the gateway's checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    pub order_id: AggregateId,
    pub gateway_order_id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

/// Coordinates checkout flows.
///
/// Stock is held from order creation until cancellation. Every path that
/// takes stock and then fails to persist the order gives the stock back
/// before returning the error.
pub struct CheckoutService<S, C, G, P>
where
    S: DocumentStore + Clone,
    C: CatalogStore + Clone,
    G: PaymentGateway,
    P: SettingsProvider,
{
    orders: OrderService<S>,
    carts: CartService<S, C>,
    reservation: StockReservation<C>,
    gateway: G,
    settings: P,
    signer: PaymentSigner,
    outbox: NotificationOutbox,
    currency: String,
}

impl<S, C, G, P> CheckoutService<S, C, G, P>
where
    S: DocumentStore + Clone,
    C: CatalogStore + Clone,
    G: PaymentGateway,
    P: SettingsProvider,
{
    pub fn new(
        store: S,
        catalog: C,
        gateway: G,
        settings: P,
        signer: PaymentSigner,
        outbox: NotificationOutbox,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            carts: CartService::new(store, catalog.clone()),
            reservation: StockReservation::new(catalog),
            gateway,
            settings,
            signer,
            outbox,
            currency: currency.into(),
        }
    }

    pub fn carts(&self) -> &CartService<S, C> {
        &self.carts
    }

    pub fn orders(&self) -> &OrderService<S> {
        &self.orders
    }

    pub fn catalog(&self) -> &C {
        self.reservation.catalog()
    }

    /// Places an order from the requested items.
    ///
    /// Prices and names are read from the catalog now and frozen on the
    /// order. Stock for every line is reserved before the order is saved; if
    /// the save fails the reservation is released.
    #[tracing::instrument(skip(self, request), fields(user_id = %caller.user_id, items = request.items.len()))]
    pub async fn create_order(&self, caller: Caller, request: CreateOrderRequest) -> Result<Order> {
        let started = Instant::now();

        if request.items.is_empty() {
            return Err(CheckoutError::validation("order has no items"));
        }
        if let Some(item) = request.items.iter().find(|item| item.quantity == 0) {
            return Err(CheckoutError::validation(format!(
                "quantity for {} must be greater than 0",
                item.product_id
            )));
        }
        request
            .shipping_address
            .validate()
            .map_err(|e| CheckoutError::validation(e.to_string()))?;

        let lines = self.price_lines(&request.items).await?;
        let subtotal = Money::checked_sum(lines.iter().map(|line| line.subtotal))
            .ok_or_else(|| CheckoutError::validation("order subtotal is out of range"))?;
        let settings = self.settings.delivery_settings().await?;
        let delivery = delivery_charge(
            subtotal,
            request.distance_km,
            settings.as_ref(),
            request.delivery_charge,
        )?;

        let cmd = PlaceOrder::new(
            caller.user_id,
            lines,
            delivery,
            request.payment_method,
            request.shipping_address,
        );
        let order_id = cmd.order_id;

        // Everything `place` checks must hold before stock is touched.
        Order::default()
            .place(&cmd)
            .map_err(|e| CheckoutError::validation(e.to_string()))?;

        self.reservation.reserve(&cmd.lines).await?;

        let order = match self.orders.place(cmd.clone()).await {
            Ok(result) => result.aggregate,
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "order save failed, releasing stock");
                self.reservation.release(&cmd.lines).await;
                return Err(e.into());
            }
        };

        metrics::counter!(
            "orders_created_total",
            "payment_method" => payment_method_label(order.payment_method())
        )
        .increment(1);
        metrics::histogram!("order_creation_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        self.outbox
            .send(Notification::order_placed(order_id, caller.user_id, &order));

        if order.payment_method() == PaymentMethod::Cod {
            self.clear_cart(caller.user_id).await;
        }

        Ok(order)
    }

    /// Opens a gateway payment for an order.
    ///
    /// A cancelled order can be revived this way: its stock is reserved again
    /// first, and stays with the order only if the intent is saved.
    #[tracing::instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn create_payment_intent(
        &self,
        caller: Caller,
        order_id: AggregateId,
    ) -> Result<PaymentIntent> {
        let order = self.orders.require(order_id).await?;
        caller.ensure_can_access(&order)?;

        if !order.accepts_payment_intent() {
            return Err(domain::OrderError::InvalidTransition {
                from: order.status(),
                to: OrderStatus::PaymentPending,
            }
            .into());
        }

        let revived = order.status() == OrderStatus::Cancelled;
        let lines = order.lines().to_vec();
        if revived {
            tracing::info!(%order_id, "re-reserving stock for cancelled order");
            self.reservation.reserve(&lines).await?;
        }

        let result = self.open_intent(order).await;
        if result.is_err() && revived {
            tracing::warn!(%order_id, "payment intent failed, releasing re-reserved stock");
            self.reservation.release(&lines).await;
        }
        result
    }

    async fn open_intent(&self, order: Order) -> Result<PaymentIntent> {
        let order_id = order.id().ok_or(domain::OrderError::NotPlaced)?;
        let receipt = order.order_number().to_string();
        let gateway_order = self
            .gateway
            .create_payment_intent(order.total_amount(), &self.currency, &receipt)
            .await?;

        self.orders
            .execute_on(order, |o| o.open_payment_intent(&gateway_order.id))
            .await?;
        tracing::info!(%order_id, gateway_order_id = %gateway_order.id, "payment intent opened");

        Ok(PaymentIntent {
            order_id,
            gateway_order_id: gateway_order.id,
            amount: gateway_order.amount,
            currency: gateway_order.currency,
            receipt,
        })
    }

    /// Checks a gateway payment confirmation and records the payment.
    ///
    /// A confirmation for another gateway order or with a bad signature marks
    /// the payment failed and leaves the lifecycle alone. A paid order is
    /// returned unchanged.
    #[tracing::instrument(skip(self, request), fields(user_id = %caller.user_id, order_id = %request.order_id))]
    pub async fn verify_payment(
        &self,
        caller: Caller,
        request: VerifyPaymentRequest,
    ) -> Result<Order> {
        request.validate()?;

        let order = self.orders.require(request.order_id).await?;
        caller.ensure_can_access(&order)?;

        if order.payment_status() == PaymentStatus::Paid {
            tracing::info!("payment already recorded");
            return Ok(order);
        }

        let genuine = order.gateway_order_id() == Some(request.gateway_order_id.as_str())
            && self.signer.verify(
                &request.gateway_order_id,
                &request.payment_id,
                &request.signature,
            );

        if !genuine {
            metrics::counter!("payments_failed_total").increment(1);
            tracing::warn!(
                gateway_order_id = %request.gateway_order_id,
                "payment signature rejected"
            );
            self.orders.execute_on(order, |o| o.fail_payment()).await?;
            return Err(CheckoutError::InvalidPaymentSignature {
                order_id: request.order_id,
            });
        }

        let order = self
            .orders
            .execute_on(order, |o| {
                o.record_payment(&request.payment_id, &request.signature)
            })
            .await?
            .aggregate;

        metrics::counter!("payments_verified_total").increment(1);
        tracing::info!(payment_id = %request.payment_id, "payment verified");

        if let Some(owner) = order.user_id() {
            self.outbox.send(Notification::payment_received(
                request.order_id,
                owner,
                &order,
                &request.payment_id,
            ));
            self.clear_cart(owner).await;
        }

        Ok(order)
    }

    /// Cancels an order and returns its stock.
    ///
    /// Stock is released before the cancellation is saved. If the save loses
    /// a version race, the released stock is reserved again and the conflict
    /// is returned.
    #[tracing::instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn cancel_order(&self, caller: Caller, order_id: AggregateId) -> Result<Order> {
        let order = self.orders.require(order_id).await?;
        caller.ensure_can_access(&order)?;

        // Rejects illegal cancellations before any stock moves.
        order.cancel()?;

        let released = self.reservation.release(order.lines()).await;
        if released.len() < order.lines().len() {
            tracing::warn!(
                %order_id,
                released = released.len(),
                lines = order.lines().len(),
                "not every line could be released"
            );
        }

        let order = match self.orders.execute_on(order, |o| o.cancel()).await {
            Ok(result) => result.aggregate,
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "cancellation not saved, re-reserving stock");
                if let Err(reserve_err) = self.reservation.reserve(&released).await {
                    tracing::error!(
                        %order_id,
                        error = %reserve_err,
                        "failed to re-reserve stock after aborted cancellation"
                    );
                }
                return Err(e.into());
            }
        };

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(%order_id, "order cancelled");

        if let Some(owner) = order.user_id() {
            let refund_due = order.payment_status() == PaymentStatus::Refunded;
            self.outbox.send(Notification::order_cancelled(
                order_id, owner, &order, refund_due,
            ));
        }

        Ok(order)
    }

    /// Moves an order along its lifecycle. Admin only.
    ///
    /// `CANCELLED` goes through [`Self::cancel_order`] so stock is returned.
    #[tracing::instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn update_status(
        &self,
        caller: Caller,
        order_id: AggregateId,
        status: OrderStatus,
    ) -> Result<Order> {
        caller.ensure_admin()?;

        if status == OrderStatus::Cancelled {
            return self.cancel_order(caller, order_id).await;
        }

        let from = self.orders.require(order_id).await?.status();
        let order = self
            .orders
            .update_status(UpdateOrderStatus::new(order_id, status))
            .await?
            .aggregate;

        if order.status() != from {
            tracing::info!(%order_id, %from, to = %order.status(), "order status changed");
            if let Some(owner) = order.user_id() {
                self.outbox
                    .send(Notification::status_changed(order_id, owner, &order, from));
            }
        }

        Ok(order)
    }

    /// Hides a finished order from its owner's order list.
    #[tracing::instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn hide_order(&self, caller: Caller, order_id: AggregateId) -> Result<Order> {
        let order = self.orders.require(order_id).await?;
        caller.ensure_can_access(&order)?;
        Ok(self
            .orders
            .execute_on(order, |o| o.hide_for_user())
            .await?
            .aggregate)
    }

    #[tracing::instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn get_order(&self, caller: Caller, order_id: AggregateId) -> Result<Order> {
        let order = self.orders.require(order_id).await?;
        caller.ensure_can_access(&order)?;
        Ok(order)
    }

    /// Lists the caller's visible orders, or with `all` every order (admin).
    #[tracing::instrument(skip(self), fields(user_id = %caller.user_id))]
    pub async fn list_orders(&self, caller: Caller, all: bool) -> Result<Vec<Order>> {
        if all {
            caller.ensure_admin()?;
            return Ok(self.orders.list_all().await?);
        }
        Ok(self.orders.list_for_user(caller.user_id).await?)
    }

    /// Turns requested items into priced order lines.
    ///
    /// Items that resolve to the same stock counter are merged into one line
    /// so the counter is decremented once.
    async fn price_lines(&self, items: &[OrderItemRequest]) -> Result<Vec<OrderLine>> {
        let mut lines: Vec<OrderLine> = Vec::with_capacity(items.len());
        let mut index: HashMap<(ProductId, Option<VariantId>), usize> = HashMap::new();

        for item in items {
            let product = self
                .catalog()
                .get_product(&item.product_id)
                .await?
                .ok_or_else(|| DomainError::not_found("Product", &item.product_id))?;
            let resolved = product.resolve(item.variant_id.as_ref());
            let key = (product.id.clone(), resolved.variant_id.clone());

            match index.get(&key) {
                Some(&at) => {
                    let merged = lines[at].clone();
                    let quantity = merged.quantity.checked_add(item.quantity).ok_or_else(|| {
                        CheckoutError::validation(format!(
                            "combined quantity for {} is out of range",
                            merged.product_id
                        ))
                    })?;
                    lines[at] = OrderLine::new(
                        merged.product_id,
                        merged.variant_id,
                        merged.variant_label,
                        merged.product_name,
                        merged.unit_price,
                        quantity,
                    )
                    .map_err(|e| CheckoutError::validation(e.to_string()))?;
                }
                None => {
                    index.insert(key, lines.len());
                    lines.push(OrderLine::new(
                        product.id.clone(),
                        resolved.variant_id,
                        resolved.variant_label,
                        product.name.clone(),
                        resolved.unit_price,
                        item.quantity,
                    )
                    .map_err(|e| CheckoutError::validation(e.to_string()))?);
                }
            }
        }

        Ok(lines)
    }

    async fn clear_cart(&self, user_id: UserId) {
        if let Err(e) = self.carts.clear(user_id).await {
            tracing::warn!(%user_id, error = %e, "failed to clear cart");
        }
    }
}

fn payment_method_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cod => "cod",
        PaymentMethod::Gateway => "gateway",
    }
}
