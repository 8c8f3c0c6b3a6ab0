//! HTTP API server for the storefront core.
//!
//! Provides REST endpoints for the catalog, carts, orders and payments, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use checkout::{
    CheckoutService, InMemoryPaymentGateway, InMemorySettingsProvider, NotificationOutbox,
    PaymentGateway, PaymentSigner, SettingsProvider,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{CatalogStore, DocumentStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

pub type SharedDocumentStore = Arc<dyn DocumentStore>;
pub type SharedCatalogStore = Arc<dyn CatalogStore>;
pub type SharedPaymentGateway = Arc<dyn PaymentGateway>;
pub type SharedSettingsProvider = Arc<dyn SettingsProvider>;

pub type Checkout = CheckoutService<
    SharedDocumentStore,
    SharedCatalogStore,
    SharedPaymentGateway,
    SharedSettingsProvider,
>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub checkout: Checkout,
}

/// Builds the application state over the given stores.
///
/// The payment gateway and delivery settings are the in-memory versions;
/// settings are seeded from `config`.
pub fn create_state(
    documents: SharedDocumentStore,
    catalog: SharedCatalogStore,
    config: &Config,
    outbox: NotificationOutbox,
) -> Arc<AppState> {
    let gateway: SharedPaymentGateway = Arc::new(InMemoryPaymentGateway::new());
    let settings: SharedSettingsProvider = Arc::new(InMemorySettingsProvider::new(
        config.delivery_settings.clone(),
    ));

    let checkout = CheckoutService::new(
        documents,
        catalog,
        gateway,
        settings,
        PaymentSigner::new(&config.payment_key_secret),
        outbox,
        config.payment_currency.clone(),
    );

    Arc::new(AppState { checkout })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/products/{id}",
            get(routes::products::get).put(routes::products::upsert),
        )
        .route(
            "/cart",
            get(routes::cart::get).delete(routes::cart::clear),
        )
        .route(
            "/cart/items",
            post(routes::cart::add)
                .put(routes::cart::update)
                .delete(routes::cart::remove),
        )
        .route(
            "/orders",
            post(routes::orders::create).get(routes::orders::list),
        )
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/cancel", post(routes::orders::cancel))
        .route("/orders/{id}/hide", post(routes::orders::hide))
        .route("/orders/{id}/status", put(routes::orders::update_status))
        .route(
            "/orders/{id}/payment-intent",
            post(routes::payments::create_intent),
        )
        .route("/payments/verify", post(routes::payments::verify))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
