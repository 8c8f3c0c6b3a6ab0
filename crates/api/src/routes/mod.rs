pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;
pub mod products;

use axum::extract::rejection::PathRejection;
use axum::extract::Path;
use common::AggregateId;

use crate::error::ApiError;

/// Parses an aggregate id from a path segment.
pub(crate) fn parse_aggregate_id(
    path: Result<Path<String>, PathRejection>,
) -> Result<AggregateId, ApiError> {
    let Path(id) = path?;
    uuid::Uuid::parse_str(&id)
        .map(AggregateId::from_uuid)
        .map_err(|e| ApiError::BadRequest(format!("Invalid id {id}: {e}")))
}
