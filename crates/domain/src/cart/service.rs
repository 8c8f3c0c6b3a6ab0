//! Cart service: stock-checked cart mutations with conflict retries.

use common::{ProductId, UserId, VariantId};
use store::{CatalogStore, DocumentStore, Product};

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::Cart;

/// How many times a cart mutation is attempted before giving up on a
/// contended cart.
pub const MAX_SAVE_ATTEMPTS: u32 = 3;

/// Service for managing carts.
///
/// Each user has exactly one cart, stored under [`UserId::cart_id`]. Every
/// mutation re-reads the product and the cart on each attempt, so a retry
/// after a lost version race re-validates stock against fresh data.
pub struct CartService<S: DocumentStore, C: CatalogStore> {
    handler: CommandHandler<S, Cart>,
    catalog: C,
}

impl<S: DocumentStore, C: CatalogStore> CartService<S, C> {
    pub fn new(store: S, catalog: C) -> Self {
        Self {
            handler: CommandHandler::new(store),
            catalog,
        }
    }

    /// Returns the user's cart, empty if they never added anything.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, user_id: UserId) -> Result<Cart, DomainError> {
        self.handler.load(user_id.cart_id()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        let cart_id = user_id.cart_id();
        self.with_retries(user_id, move || async move {
            let product = self.product(product_id).await?;
            self.handler
                .execute(cart_id, |cart| {
                    cart.add_item(cart_id, user_id, &product, variant_id, quantity)
                })
                .await
        })
        .await
    }

    /// Sets a line's quantity; zero removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        self.with_retries(user_id, move || async move {
            let product = self.product(product_id).await?;
            self.handler
                .execute(user_id.cart_id(), |cart| {
                    cart.set_quantity(&product, variant_id, quantity)
                })
                .await
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<Cart, DomainError> {
        self.with_retries(user_id, move || async move {
            self.handler
                .execute(user_id.cart_id(), |cart| {
                    cart.remove_item(product_id, variant_id)
                })
                .await
        })
        .await
    }

    /// Empties the user's cart. A cart that never existed stays absent.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<Cart, DomainError> {
        self.with_retries(user_id, move || async move {
            self.handler
                .execute(user_id.cart_id(), |cart| cart.clear())
                .await
        })
        .await
    }

    async fn product(&self, product_id: &ProductId) -> Result<Product, DomainError> {
        self.catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", product_id))
    }

    /// Runs one cart mutation attempt at a time until it saves, fails for a
    /// reason other than a lost version race, or runs out of attempts.
    async fn with_retries<F, Fut>(&self, user_id: UserId, attempt_fn: F) -> Result<Cart, DomainError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<CommandResult<Cart>, DomainError>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_fn().await {
                Ok(result) => return Ok(result.aggregate),
                Err(e) if e.is_conflict() && attempt < MAX_SAVE_ATTEMPTS => {
                    metrics::counter!("cart_conflict_retries_total").increment(1);
                    tracing::warn!(%user_id, attempt, "cart save conflicted, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_conflict() {
                        tracing::warn!(%user_id, attempt, "cart retry budget exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}
