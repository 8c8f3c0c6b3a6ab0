use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, ProductId, UserId, VariantId};
use tokio::sync::RwLock;

use crate::{
    CatalogStore, Document, DocumentStore, Product, Result, SaveOptions, StockLevel, StoreError,
    Version,
};

/// In-memory document store for tests and single-process deployments.
///
/// The version check and the write happen under one write lock, which gives
/// the same compare-and-set behaviour as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<(String, AggregateId), Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of documents stored.
    pub async fn document_count(&self) -> usize {
        self.documents.read().await.len()
    }
}

fn newest_first(mut documents: Vec<Document>) -> Vec<Document> {
    documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    documents
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn load(&self, kind: &str, id: AggregateId) -> Result<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(documents.get(&(kind.to_string(), id)).cloned())
    }

    async fn save(&self, document: Document, options: SaveOptions) -> Result<Version> {
        let mut documents = self.documents.write().await;
        let key = (document.kind.clone(), document.id);

        let current = documents
            .get(&key)
            .map(|d| d.version)
            .unwrap_or(Version::initial());

        if let Some(expected) = options.expected_version
            && current != expected
        {
            return Err(StoreError::ConcurrencyConflict {
                kind: document.kind,
                id: document.id,
                expected,
                actual: current,
            });
        }

        let version = document.version;
        documents.insert(key, document);
        Ok(version)
    }

    async fn list_by_owner(&self, kind: &str, owner: UserId) -> Result<Vec<Document>> {
        let documents = self.documents.read().await;
        Ok(newest_first(
            documents
                .values()
                .filter(|d| d.kind == kind && d.owner == Some(owner))
                .cloned()
                .collect(),
        ))
    }

    async fn list(&self, kind: &str) -> Result<Vec<Document>> {
        let documents = self.documents.read().await;
        Ok(newest_first(
            documents
                .values()
                .filter(|d| d.kind == kind)
                .cloned()
                .collect(),
        ))
    }
}

/// In-memory catalog. Each stock write holds the catalog write lock for the
/// whole check-and-update, so concurrent decrements cannot oversubscribe.
#[derive(Clone, Default)]
pub struct InMemoryCatalogStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog pre-populated with products.
    pub async fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        {
            let mut map = store.products.write().await;
            for product in products {
                map.insert(product.id.clone(), product);
            }
        }
        store
    }

    /// Current value of a counter; `None` for untracked or unknown counters.
    pub async fn stock_of(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Option<u32> {
        let products = self.products.read().await;
        let product = products.get(product_id)?;
        match variant_id {
            Some(id) => product.variant(id)?.stock,
            None => Some(product.stock),
        }
    }
}

/// Finds the counter a stock write targets. `Ok(None)` means untracked.
fn counter_mut<'a>(
    products: &'a mut HashMap<ProductId, Product>,
    product_id: &ProductId,
    variant_id: Option<&VariantId>,
) -> Result<Option<&'a mut u32>> {
    let product = products
        .get_mut(product_id)
        .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;

    match variant_id {
        None => Ok(Some(&mut product.stock)),
        Some(variant_id) => {
            let variant = product
                .variants
                .iter_mut()
                .find(|v| &v.id == variant_id)
                .ok_or_else(|| StoreError::VariantNotFound {
                    product_id: product_id.clone(),
                    variant_id: variant_id.clone(),
                })?;
            Ok(variant.stock.as_mut())
        }
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(product_id).cloned())
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product);
        Ok(())
    }

    async fn decrement_stock(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
        quantity: u32,
    ) -> Result<StockLevel> {
        let mut products = self.products.write().await;
        let Some(counter) = counter_mut(&mut products, product_id, variant_id)? else {
            return Ok(StockLevel::Untracked);
        };

        if *counter < quantity {
            return Err(StoreError::InsufficientStock {
                product_id: product_id.clone(),
                variant_id: variant_id.cloned(),
                requested: quantity,
                available: *counter,
            });
        }

        *counter -= quantity;
        Ok(StockLevel::Tracked(*counter))
    }

    async fn increment_stock(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
        quantity: u32,
    ) -> Result<StockLevel> {
        let mut products = self.products.write().await;
        let Some(counter) = counter_mut(&mut products, product_id, variant_id)? else {
            return Ok(StockLevel::Untracked);
        };

        *counter = counter.saturating_add(quantity);
        Ok(StockLevel::Tracked(*counter))
    }
}
