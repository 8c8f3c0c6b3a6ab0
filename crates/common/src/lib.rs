//! Shared identifiers and value types used across the storefront crates.

mod ids;
mod money;

pub use ids::{AggregateId, ProductId, UserId, VariantId};
pub use money::Money;
