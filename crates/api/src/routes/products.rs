//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use common::{Money, ProductId};
use serde::Deserialize;
use store::{CatalogStore, Product, Variant};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Deserialize)]
pub struct UpsertProductRequest {
    pub name: String,
    pub price: Money,
    pub stock: u32,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Product>, ApiError> {
    let Path(id) = path?;
    let product_id = ProductId::new(id);
    let product = state
        .checkout
        .catalog()
        .get_product(&product_id)
        .await?
        .ok_or_else(|| domain::DomainError::not_found("Product", &product_id))?;
    Ok(Json(product))
}

/// PUT /products/{id}: creates or replaces a product (admin).
#[tracing::instrument(skip(state, payload))]
pub async fn upsert(
    State(state): State<Arc<AppState>>,
    Identity(caller): Identity,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpsertProductRequest>, JsonRejection>,
) -> Result<Json<Product>, ApiError> {
    caller.ensure_admin()?;
    let Path(id) = path?;
    let Json(req) = payload?;

    if req.price.is_negative() || req.variants.iter().any(|v| v.price.is_negative()) {
        return Err(domain::DomainError::validation("prices must not be negative").into());
    }

    let product = Product {
        id: ProductId::new(id),
        name: req.name,
        price: req.price,
        stock: req.stock,
        variants: req.variants,
    };
    state.checkout.catalog().upsert_product(product.clone()).await?;
    tracing::info!(product_id = %product.id, "product saved");

    Ok(Json(product))
}
