//! Cart aggregate and related types.

mod aggregate;
mod events;
mod service;

pub use aggregate::{Cart, CartLine};
pub use events::{CartEvent, CartOpenedData, LineQuantityChangedData, LineRemovedData};
pub use service::{CartService, MAX_SAVE_ATTEMPTS};

use common::{ProductId, VariantId};
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity must be at least one when adding.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// No line exists for the product/variant pair.
    #[error(
        "Cart item not found: {product_id}{}",
        variant_id.as_ref().map(|v| format!(" ({v})")).unwrap_or_default()
    )]
    ItemNotFound {
        product_id: ProductId,
        variant_id: Option<VariantId>,
    },

    /// The resulting line quantity exceeds current availability.
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
}
