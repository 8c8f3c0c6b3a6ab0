//! API server entry point.

use std::sync::Arc;
use std::time::Duration;

use api::config::{Config, LogFormat};
use api::{SharedCatalogStore, SharedDocumentStore};
use checkout::services::notifications::DEFAULT_OUTBOX_CAPACITY;
use checkout::{LoggingDispatcher, NotificationOutbox};
use store::{InMemoryCatalogStore, InMemoryDocumentStore, PostgresStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn open_stores(
    config: &Config,
) -> Result<(SharedDocumentStore, SharedCatalogStore), Box<dyn std::error::Error>> {
    match &config.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await?;
            let store = PostgresStore::new(pool);
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL store");
            Ok((Arc::new(store.clone()), Arc::new(store)))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory stores");
            Ok((
                Arc::new(InMemoryDocumentStore::new()),
                Arc::new(InMemoryCatalogStore::new()),
            ))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env()?;
    init_tracing(&config);
    if config.uses_dev_secret() {
        tracing::warn!("PAYMENT_KEY_SECRET not set, using the development secret");
    }

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    api::routes::metrics::describe();

    // 3. Open stores and start the notification worker
    let (documents, catalog) = open_stores(&config).await?;
    let (outbox, notification_worker) =
        NotificationOutbox::spawn(LoggingDispatcher, DEFAULT_OUTBOX_CAPACITY);
    let state = api::create_state(documents, catalog, &config, outbox);

    // 4. Build the application
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 6. Let queued notifications drain
    if tokio::time::timeout(Duration::from_secs(5), notification_worker)
        .await
        .is_err()
    {
        tracing::warn!("notification queue did not drain before shutdown");
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}
