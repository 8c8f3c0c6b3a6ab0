use common::{AggregateId, ProductId, VariantId};
use thiserror::Error;

use crate::Version;

/// Errors that can occur when reading or writing the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document was saved against a version that is no longer current.
    #[error(
        "Concurrency conflict for {kind} {id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        kind: String,
        id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The product does not exist in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The product exists but has no such variant.
    #[error("Variant {variant_id} not found on product {product_id}")]
    VariantNotFound {
        product_id: ProductId,
        variant_id: VariantId,
    },

    /// A conditional decrement found fewer units than requested.
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

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
