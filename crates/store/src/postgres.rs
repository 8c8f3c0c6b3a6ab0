use async_trait::async_trait;
use common::{AggregateId, Money, ProductId, UserId, VariantId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CatalogStore, Document, DocumentStore, Product, Result, SaveOptions, StockLevel, StoreError,
    Variant, Version,
};

/// PostgreSQL-backed store implementing both documents and the catalog.
///
/// Document saves are compare-and-set on the `version` column; stock decrements
/// are a single `UPDATE ... WHERE stock >= $n`, so neither needs an explicit lock.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        Ok(Document {
            id: AggregateId::from_uuid(row.try_get::<Uuid, _>("id")?),
            kind: row.try_get("kind")?,
            owner: row
                .try_get::<Option<Uuid>, _>("owner_id")?
                .map(UserId::from_uuid),
            version: Version::new(row.try_get("version")?),
            updated_at: row.try_get("updated_at")?,
            state: row.try_get("state")?,
        })
    }

    async fn current_version(&self, kind: &str, id: AggregateId) -> Result<Version> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM documents WHERE kind = $1 AND id = $2")
                .bind(kind)
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(Version::new(version.unwrap_or(0)))
    }
}

fn to_units(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn load(&self, kind: &str, id: AggregateId) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT kind, id, owner_id, version, updated_at, state
            FROM documents
            WHERE kind = $1 AND id = $2
            "#,
        )
        .bind(kind)
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn save(&self, document: Document, options: SaveOptions) -> Result<Version> {
        let owner = document.owner.map(|o| o.as_uuid());

        let affected = match options.expected_version {
            Some(expected) if expected == Version::initial() => {
                sqlx::query(
                    r#"
                    INSERT INTO documents (kind, id, owner_id, version, updated_at, state)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (kind, id) DO NOTHING
                    "#,
                )
                .bind(&document.kind)
                .bind(document.id.as_uuid())
                .bind(owner)
                .bind(document.version.as_i64())
                .bind(document.updated_at)
                .bind(&document.state)
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
            Some(expected) => {
                sqlx::query(
                    r#"
                    UPDATE documents
                    SET owner_id = $3, version = $4, updated_at = $5, state = $6
                    WHERE kind = $1 AND id = $2 AND version = $7
                    "#,
                )
                .bind(&document.kind)
                .bind(document.id.as_uuid())
                .bind(owner)
                .bind(document.version.as_i64())
                .bind(document.updated_at)
                .bind(&document.state)
                .bind(expected.as_i64())
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO documents (kind, id, owner_id, version, updated_at, state)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (kind, id) DO UPDATE
                    SET owner_id = EXCLUDED.owner_id,
                        version = EXCLUDED.version,
                        updated_at = EXCLUDED.updated_at,
                        state = EXCLUDED.state
                    "#,
                )
                .bind(&document.kind)
                .bind(document.id.as_uuid())
                .bind(owner)
                .bind(document.version.as_i64())
                .bind(document.updated_at)
                .bind(&document.state)
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
        };

        if affected == 0 {
            let actual = self.current_version(&document.kind, document.id).await?;
            return Err(StoreError::ConcurrencyConflict {
                kind: document.kind,
                id: document.id,
                expected: options.expected_version.unwrap_or(Version::initial()),
                actual,
            });
        }

        Ok(document.version)
    }

    async fn list_by_owner(&self, kind: &str, owner: UserId) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT kind, id, owner_id, version, updated_at, state
            FROM documents
            WHERE kind = $1 AND owner_id = $2
            ORDER BY updated_at DESC
            "#,
        )
        .bind(kind)
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn list(&self, kind: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT kind, id, owner_id, version, updated_at, state
            FROM documents
            WHERE kind = $1
            ORDER BY updated_at DESC
            "#,
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_document).collect()
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        let Some(row) = sqlx::query("SELECT id, name, price, stock FROM products WHERE id = $1")
            .bind(product_id.as_str())
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let variant_rows = sqlx::query(
            r#"
            SELECT id, label, price, stock, active
            FROM product_variants
            WHERE product_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(product_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let variants = variant_rows
            .into_iter()
            .map(|row| -> Result<Variant> {
                Ok(Variant {
                    id: VariantId::new(row.try_get::<String, _>("id")?),
                    label: row.try_get("label")?,
                    price: Money::from_minor(row.try_get("price")?),
                    stock: row.try_get::<Option<i64>, _>("stock")?.map(to_units),
                    active: row.try_get("active")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_minor(row.try_get("price")?),
            stock: to_units(row.try_get("stock")?),
            variants,
        }))
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, price = EXCLUDED.price, stock = EXCLUDED.stock
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.minor())
        .bind(i64::from(product.stock))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM product_variants WHERE product_id = $1")
            .bind(product.id.as_str())
            .execute(&mut *tx)
            .await?;

        for (position, variant) in product.variants.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO product_variants (product_id, id, label, price, stock, active, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(product.id.as_str())
            .bind(variant.id.as_str())
            .bind(&variant.label)
            .bind(variant.price.minor())
            .bind(variant.stock.map(i64::from))
            .bind(variant.active)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn decrement_stock(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
        quantity: u32,
    ) -> Result<StockLevel> {
        let requested = i64::from(quantity);

        let (remaining, current) = match variant_id {
            None => {
                let remaining: Option<i64> = sqlx::query_scalar(
                    "UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2 RETURNING stock",
                )
                .bind(product_id.as_str())
                .bind(requested)
                .fetch_optional(&self.pool)
                .await?;

                if remaining.is_some() {
                    (remaining, None)
                } else {
                    let current: Option<i64> =
                        sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                            .bind(product_id.as_str())
                            .fetch_optional(&self.pool)
                            .await?;
                    let current =
                        current.ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;
                    (None, Some(current))
                }
            }
            Some(variant) => {
                let tracked: Option<Option<i64>> = sqlx::query_scalar(
                    "SELECT stock FROM product_variants WHERE product_id = $1 AND id = $2",
                )
                .bind(product_id.as_str())
                .bind(variant.as_str())
                .fetch_optional(&self.pool)
                .await?;

                match tracked {
                    None => {
                        return Err(StoreError::VariantNotFound {
                            product_id: product_id.clone(),
                            variant_id: variant.clone(),
                        });
                    }
                    Some(None) => return Ok(StockLevel::Untracked),
                    Some(Some(current)) => {
                        let remaining: Option<Option<i64>> = sqlx::query_scalar(
                            r#"
                            UPDATE product_variants SET stock = stock - $3
                            WHERE product_id = $1 AND id = $2 AND stock >= $3
                            RETURNING stock
                            "#,
                        )
                        .bind(product_id.as_str())
                        .bind(variant.as_str())
                        .bind(requested)
                        .fetch_optional(&self.pool)
                        .await?;
                        (remaining.flatten(), Some(current))
                    }
                }
            }
        };

        match remaining {
            Some(remaining) => Ok(StockLevel::Tracked(to_units(remaining))),
            None => Err(StoreError::InsufficientStock {
                product_id: product_id.clone(),
                variant_id: variant_id.cloned(),
                requested: quantity,
                available: current.map(to_units).unwrap_or(0),
            }),
        }
    }

    async fn increment_stock(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
        quantity: u32,
    ) -> Result<StockLevel> {
        let amount = i64::from(quantity);

        match variant_id {
            None => {
                let updated: Option<i64> = sqlx::query_scalar(
                    "UPDATE products SET stock = stock + $2 WHERE id = $1 RETURNING stock",
                )
                .bind(product_id.as_str())
                .bind(amount)
                .fetch_optional(&self.pool)
                .await?;

                updated
                    .map(|stock| StockLevel::Tracked(to_units(stock)))
                    .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))
            }
            Some(variant) => {
                // NULL + n stays NULL, so untracked variants pass through unchanged.
                let updated: Option<Option<i64>> = sqlx::query_scalar(
                    r#"
                    UPDATE product_variants SET stock = stock + $3
                    WHERE product_id = $1 AND id = $2
                    RETURNING stock
                    "#,
                )
                .bind(product_id.as_str())
                .bind(variant.as_str())
                .bind(amount)
                .fetch_optional(&self.pool)
                .await?;

                match updated {
                    None => Err(StoreError::VariantNotFound {
                        product_id: product_id.clone(),
                        variant_id: variant.clone(),
                    }),
                    Some(None) => Ok(StockLevel::Untracked),
                    Some(Some(stock)) => Ok(StockLevel::Tracked(to_units(stock))),
                }
            }
        }
    }
}
