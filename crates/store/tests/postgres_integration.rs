//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container. Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{AggregateId, Money, ProductId, UserId, VariantId};
use sqlx::PgPool;
use store::{
    CatalogStore, Document, DocumentStore, PostgresStore, Product, SaveOptions, StockLevel,
    StoreError, Variant, Version,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::new(pool.clone())
                .run_migrations()
                .await
                .unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE documents, product_variants, products")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn onions() -> Product {
    Product {
        id: ProductId::new("ONION"),
        name: "Onions".to_string(),
        price: Money::from_minor(3000),
        stock: 5,
        variants: vec![
            Variant {
                id: VariantId::new("2kg"),
                label: "2 kg bag".to_string(),
                price: Money::from_minor(5500),
                stock: Some(3),
                active: true,
            },
            Variant {
                id: VariantId::new("sack"),
                label: "Sack".to_string(),
                price: Money::from_minor(60000),
                stock: None,
                active: true,
            },
        ],
    }
}

fn cart_document(id: AggregateId, owner: UserId, version: i64) -> Document {
    Document::from_state(
        id,
        "Cart",
        Some(owner),
        Version::new(version),
        &serde_json::json!({ "lines": version }),
    )
    .unwrap()
}

#[tokio::test]
async fn save_and_load_document() {
    let store = get_test_store().await;
    let id = AggregateId::new();
    let owner = UserId::new();

    store
        .save(cart_document(id, owner, 1), SaveOptions::expect_new())
        .await
        .unwrap();

    let loaded = store.load("Cart", id).await.unwrap().unwrap();
    assert_eq!(loaded.version, Version::first());
    assert_eq!(loaded.owner, Some(owner));
    assert_eq!(loaded.state["lines"], 1);
}

#[tokio::test]
async fn duplicate_create_conflicts() {
    let store = get_test_store().await;
    let id = AggregateId::new();
    let owner = UserId::new();

    store
        .save(cart_document(id, owner, 1), SaveOptions::expect_new())
        .await
        .unwrap();

    let err = store
        .save(cart_document(id, owner, 1), SaveOptions::expect_new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ConcurrencyConflict { .. }));
}

#[tokio::test]
async fn stale_update_conflicts() {
    let store = get_test_store().await;
    let id = AggregateId::new();
    let owner = UserId::new();

    store
        .save(cart_document(id, owner, 1), SaveOptions::expect_new())
        .await
        .unwrap();
    store
        .save(
            cart_document(id, owner, 2),
            SaveOptions::expect_version(Version::first()),
        )
        .await
        .unwrap();

    let err = store
        .save(
            cart_document(id, owner, 2),
            SaveOptions::expect_version(Version::first()),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::ConcurrencyConflict { actual, .. } if actual == Version::new(2)
    ));
}

#[tokio::test]
async fn list_documents_by_owner() {
    let store = get_test_store().await;
    let owner = UserId::new();

    for _ in 0..2 {
        store
            .save(
                cart_document(AggregateId::new(), owner, 1),
                SaveOptions::expect_new(),
            )
            .await
            .unwrap();
    }
    store
        .save(
            cart_document(AggregateId::new(), UserId::new(), 1),
            SaveOptions::expect_new(),
        )
        .await
        .unwrap();

    assert_eq!(store.list_by_owner("Cart", owner).await.unwrap().len(), 2);
    assert_eq!(store.list("Cart").await.unwrap().len(), 3);
}

#[tokio::test]
async fn upsert_and_get_product_with_variants() {
    let store = get_test_store().await;
    store.upsert_product(onions()).await.unwrap();

    let product = store
        .get_product(&ProductId::new("ONION"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product, onions());

    let mut renamed = onions();
    renamed.name = "Red onions".to_string();
    renamed.variants.pop();
    store.upsert_product(renamed.clone()).await.unwrap();

    let product = store
        .get_product(&ProductId::new("ONION"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product, renamed);
}

#[tokio::test]
async fn conditional_decrement_rejects_oversell() {
    let store = get_test_store().await;
    store.upsert_product(onions()).await.unwrap();
    let id = ProductId::new("ONION");

    assert_eq!(
        store.decrement_stock(&id, None, 4).await.unwrap(),
        StockLevel::Tracked(1)
    );

    let err = store.decrement_stock(&id, None, 2).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientStock {
            requested: 2,
            available: 1,
            ..
        }
    ));

    assert_eq!(
        store.increment_stock(&id, None, 4).await.unwrap(),
        StockLevel::Tracked(5)
    );
}

#[tokio::test]
async fn variant_stock_and_untracked_variants() {
    let store = get_test_store().await;
    store.upsert_product(onions()).await.unwrap();
    let id = ProductId::new("ONION");
    let bag = VariantId::new("2kg");
    let sack = VariantId::new("sack");

    assert_eq!(
        store.decrement_stock(&id, Some(&bag), 3).await.unwrap(),
        StockLevel::Tracked(0)
    );
    assert!(store.decrement_stock(&id, Some(&bag), 1).await.is_err());

    assert_eq!(
        store.decrement_stock(&id, Some(&sack), 500).await.unwrap(),
        StockLevel::Untracked
    );
    assert_eq!(
        store.increment_stock(&id, Some(&sack), 500).await.unwrap(),
        StockLevel::Untracked
    );

    let err = store
        .decrement_stock(&id, Some(&VariantId::new("tiny")), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::VariantNotFound { .. }));
}

#[tokio::test]
async fn concurrent_decrements_never_oversell() {
    let store = get_test_store().await;
    store.upsert_product(onions()).await.unwrap();
    let id = ProductId::new("ONION");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            store.decrement_stock(&id, None, 1).await.is_ok()
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 5);
    let product = store.get_product(&id).await.unwrap().unwrap();
    assert_eq!(product.stock, 0);
}
