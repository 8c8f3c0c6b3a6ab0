//! Persistence for the storefront core.
//!
//! Two concerns live here:
//! - [`DocumentStore`]: whole-aggregate documents (carts, orders) guarded by an
//!   optimistic version check on every save.
//! - [`CatalogStore`]: products, variants and their stock counters. Stock only ever
//!   moves through a conditional decrement or an increment, so a committed write
//!   can never leave a counter negative.

pub mod catalog;
pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod version;

pub use catalog::{Availability, CatalogStore, Product, ResolvedItem, StockLevel, Variant};
pub use common::AggregateId;
pub use document::{Document, DocumentStore, SaveOptions};
pub use error::{Result, StoreError};
pub use memory::{InMemoryCatalogStore, InMemoryDocumentStore};
pub use postgres::PostgresStore;
pub use version::Version;
