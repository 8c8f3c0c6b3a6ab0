//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use checkout::CreateOrderRequest;
use chrono::{DateTime, Utc};
use common::{Money, UserId};
use domain::{
    Aggregate, Order, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress,
    StatusChange,
};
use serde::{Deserialize, Serialize};

use super::parse_aggregate_id;
use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    #[serde(default)]
    pub all: bool,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub user_id: Option<UserId>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub lines: Vec<OrderLine>,
    pub subtotal: Money,
    pub delivery_charge: Money,
    pub total_amount: Money,
    pub gateway_order_id: Option<String>,
    pub payment_id: Option<String>,
    pub shipping_address: ShippingAddress,
    pub status_history: Vec<StatusChange>,
    pub created_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().map(|id| id.to_string()).unwrap_or_default(),
            order_number: order.order_number().to_string(),
            user_id: order.user_id(),
            status: order.status(),
            payment_status: order.payment_status(),
            payment_method: order.payment_method(),
            lines: order.lines().to_vec(),
            subtotal: order.subtotal(),
            delivery_charge: order.delivery_charge(),
            total_amount: order.total_amount(),
            gateway_order_id: order.gateway_order_id().map(str::to_string),
            payment_id: order.payment_id().map(str::to_string),
            shipping_address: order.shipping_address().clone(),
            status_history: order.status_history().to_vec(),
            created_at: order.created_at(),
            version: order.version().as_i64(),
        }
    }
}

// -- Handlers --

/// POST /orders: places an order and reserves its stock.
#[tracing::instrument(skip(state, payload))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(req) = payload?;
    let order = state.checkout.create_order(caller, req).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders: the caller's orders; admins may pass `?all=true`.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let Query(query) = query?;
    let orders = state.checkout.list_orders(caller, query.all).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(path)?;
    let order = state.checkout.get_order(caller, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/cancel: cancels and returns the stock.
#[tracing::instrument(skip(state))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(path)?;
    let order = state.checkout.cancel_order(caller, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/hide: hides a finished order from the owner's list.
#[tracing::instrument(skip(state))]
pub async fn hide(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(path)?;
    let order = state.checkout.hide_order(caller, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PUT /orders/{id}/status (admin). Accepts canonical and legacy labels.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(path)?;
    let Json(req) = payload?;
    let status = OrderStatus::from_label(&req.status)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown order status: {}", req.status)))?;

    let order = state
        .checkout
        .update_status(caller, order_id, status)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}
