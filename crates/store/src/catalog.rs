//! Catalog records and the inventory stock contract.

use std::sync::Arc;

use async_trait::async_trait;
use common::{Money, ProductId, VariantId};
use serde::{Deserialize, Serialize};

use crate::Result;

/// A sellable product with its base price and stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

/// A purchasable variation of a product (pack size, weight).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub label: String,
    pub price: Money,
    /// `None` means the variant's stock is not tracked and never runs out.
    pub stock: Option<u32>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// How many units of something can currently be sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Limited(u32),
    Unlimited,
}

impl Availability {
    pub fn allows(&self, quantity: u32) -> bool {
        match self {
            Availability::Limited(available) => quantity <= *available,
            Availability::Unlimited => true,
        }
    }

    /// Units available, `u32::MAX` when unconstrained.
    pub fn units(&self) -> u32 {
        match self {
            Availability::Limited(available) => *available,
            Availability::Unlimited => u32::MAX,
        }
    }
}

/// The price, label and stock counter that apply to a (product, variant?) request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItem {
    /// The variant whose counter and price apply, if any.
    pub variant_id: Option<VariantId>,
    pub variant_label: Option<String>,
    pub unit_price: Money,
    pub availability: Availability,
}

impl Product {
    pub fn variant(&self, variant_id: &VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| &v.id == variant_id)
    }

    /// Resolves which price and stock counter govern a request.
    ///
    /// A requested variant applies only if it exists and is active; otherwise the
    /// request falls back to the product's base price and base stock.
    pub fn resolve(&self, variant_id: Option<&VariantId>) -> ResolvedItem {
        match variant_id.and_then(|id| self.variant(id)).filter(|v| v.active) {
            Some(variant) => ResolvedItem {
                variant_id: Some(variant.id.clone()),
                variant_label: Some(variant.label.clone()),
                unit_price: variant.price,
                availability: variant
                    .stock
                    .map_or(Availability::Unlimited, Availability::Limited),
            },
            None => ResolvedItem {
                variant_id: None,
                variant_label: None,
                unit_price: self.price,
                availability: Availability::Limited(self.stock),
            },
        }
    }
}

/// Stock remaining on a counter after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockLevel {
    Tracked(u32),
    /// The counter is an untracked variant; nothing was written.
    Untracked,
}

/// The inventory store: ground truth for products and stock counters.
///
/// `variant_id` on the stock operations names the exact counter to touch:
/// `None` is the product's base stock, `Some` a variant's own stock. Callers
/// resolve which counter applies with [`Product::resolve`] first.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>>;

    /// Inserts or fully replaces a product and its variants.
    async fn upsert_product(&self, product: Product) -> Result<()>;

    /// Atomically decrements a counter if it holds at least `quantity` units.
    ///
    /// Fails with `InsufficientStock` (and writes nothing) otherwise. Untracked
    /// variants return [`StockLevel::Untracked`] without writing.
    async fn decrement_stock(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
        quantity: u32,
    ) -> Result<StockLevel>;

    /// Returns `quantity` units to a counter.
    async fn increment_stock(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
        quantity: u32,
    ) -> Result<StockLevel>;
}

#[async_trait]
impl<T: CatalogStore + ?Sized> CatalogStore for Arc<T> {
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        (**self).get_product(product_id).await
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        (**self).upsert_product(product).await
    }

    async fn decrement_stock(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
        quantity: u32,
    ) -> Result<StockLevel> {
        (**self)
            .decrement_stock(product_id, variant_id, quantity)
            .await
    }

    async fn increment_stock(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
        quantity: u32,
    ) -> Result<StockLevel> {
        (**self)
            .increment_stock(product_id, variant_id, quantity)
            .await
    }
}
