//! Domain error types.

use common::{AggregateId, ProductId, VariantId};
use store::StoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the store that the domain does not interpret.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// An error occurred in the order aggregate.
    #[error("Order error: {0}")]
    Order(OrderError),

    /// An error occurred in the cart aggregate.
    #[error("Cart error: {0}")]
    Cart(CartError),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A stock counter cannot cover the requested quantity.
    #[error(
        "Insufficient stock for {product_id}{}: requested {requested}, available {available}",
        variant_id.as_ref().map(|v| format!(" ({v})")).unwrap_or_default()
    )]
    InsufficientStock {
        product_id: ProductId,
        variant_id: Option<VariantId>,
        requested: u32,
        available: u32,
    },

    /// Another writer saved the aggregate first.
    #[error("Concurrent modification of {aggregate_type} {aggregate_id}")]
    ConcurrentModification {
        aggregate_type: String,
        aggregate_id: AggregateId,
    },

    /// The request is malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    /// Returns true if this error came from a lost optimistic version check.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::ConcurrentModification { .. })
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConcurrencyConflict { kind, id, .. } => {
                DomainError::ConcurrentModification {
                    aggregate_type: kind,
                    aggregate_id: id,
                }
            }
            StoreError::ProductNotFound(id) => DomainError::not_found("Product", id),
            StoreError::VariantNotFound {
                product_id,
                variant_id,
            } => DomainError::not_found("Variant", format!("{product_id}/{variant_id}")),
            StoreError::InsufficientStock {
                product_id,
                variant_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                product_id,
                variant_id,
                requested,
                available,
            },
            other => DomainError::Store(other),
        }
    }
}

impl From<OrderError> for DomainError {
    fn from(e: OrderError) -> Self {
        DomainError::Order(e)
    }
}

impl From<CartError> for DomainError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::InsufficientStock {
                product_id,
                variant_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                product_id,
                variant_id,
                requested,
                available,
            },
            other => DomainError::Cart(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::Version;

    #[test]
    fn version_conflict_becomes_concurrent_modification() {
        let id = AggregateId::new();
        let err: DomainError = StoreError::ConcurrencyConflict {
            kind: "Cart".to_string(),
            id,
            expected: Version::first(),
            actual: Version::new(2),
        }
        .into();

        assert!(err.is_conflict());
        assert_eq!(err.to_string(), format!("Concurrent modification of Cart {id}"));
    }

    #[test]
    fn missing_product_becomes_not_found() {
        let err: DomainError = StoreError::ProductNotFound(ProductId::new("EGGS")).into();
        assert!(matches!(
            err,
            DomainError::NotFound { entity: "Product", ref id } if id == "EGGS"
        ));
    }

    #[test]
    fn stock_errors_keep_the_offending_counter() {
        let err: DomainError = StoreError::InsufficientStock {
            product_id: ProductId::new("RICE"),
            variant_id: Some(VariantId::new("5kg")),
            requested: 3,
            available: 1,
        }
        .into();

        assert_eq!(
            err.to_string(),
            "Insufficient stock for RICE (5kg): requested 3, available 1"
        );
    }
}
