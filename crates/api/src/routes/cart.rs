//! Cart endpoints. Every route acts on the caller's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use common::{Money, ProductId, VariantId};
use domain::{Cart, CartLine};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Deserialize)]
pub struct CartItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct RemoveItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartLine>,
    pub item_count: u32,
    pub total_amount: Money,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            item_count: cart.item_count(),
            total_amount: cart.total_amount(),
            items: cart.lines().to_vec(),
        }
    }
}

/// GET /cart
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.checkout.carts().get(caller.user_id).await?;
    Ok(Json(cart.into()))
}

/// POST /cart/items: adds units to a line.
#[tracing::instrument(skip(state, payload))]
pub async fn add(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    payload: Result<Json<CartItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let Json(req) = payload?;
    let cart = state
        .checkout
        .carts()
        .add(
            caller.user_id,
            &req.product_id,
            req.variant_id.as_ref(),
            req.quantity,
        )
        .await?;
    Ok(Json(cart.into()))
}

/// PUT /cart/items: sets a line's quantity; zero removes it.
#[tracing::instrument(skip(state, payload))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    payload: Result<Json<CartItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let Json(req) = payload?;
    let cart = state
        .checkout
        .carts()
        .set_quantity(
            caller.user_id,
            &req.product_id,
            req.variant_id.as_ref(),
            req.quantity,
        )
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart/items
#[tracing::instrument(skip(state, payload))]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    payload: Result<Json<RemoveItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let Json(req) = payload?;
    let cart = state
        .checkout
        .carts()
        .remove(caller.user_id, &req.product_id, req.variant_id.as_ref())
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart
#[tracing::instrument(skip(state))]
pub async fn clear(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.checkout.carts().clear(caller.user_id).await?;
    Ok(Json(cart.into()))
}
