//! Payment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use checkout::{PaymentIntent, VerifyPaymentRequest};

use super::orders::OrderResponse;
use super::parse_aggregate_id;
use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

/// POST /orders/{id}/payment-intent
#[tracing::instrument(skip(state))]
pub async fn create_intent(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<PaymentIntent>, ApiError> {
    let order_id = parse_aggregate_id(path)?;
    let intent = state
        .checkout
        .create_payment_intent(caller, order_id)
        .await?;
    Ok(Json(intent))
}

/// POST /payments/verify: checks the gateway's signed confirmation.
#[tracing::instrument(skip(state, payload))]
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    payload: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let Json(req) = payload?;
    let order = state.checkout.verify_payment(caller, req).await?;
    Ok(Json(OrderResponse::from(&order)))
}
