//! Prometheus metrics endpoint and metric descriptions.

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use metrics::Unit;
use metrics_exporter_prometheus::PrometheusHandle;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Registers help text for the storefront metrics.
///
/// Call once after the recorder is installed so `# HELP` lines appear in the
/// scrape output.
pub fn describe() {
    metrics::describe_counter!("orders_created_total", "Orders placed, by payment method");
    metrics::describe_counter!("orders_cancelled_total", "Orders cancelled with stock returned");
    metrics::describe_counter!(
        "stock_reservation_failures_total",
        "Order creations or revivals rejected for lack of stock"
    );
    metrics::describe_counter!("payments_verified_total", "Gateway payments accepted");
    metrics::describe_counter!(
        "payments_failed_total",
        "Gateway confirmations rejected for a bad signature or order id"
    );
    metrics::describe_counter!(
        "cart_conflict_retries_total",
        "Cart saves retried after a concurrent write"
    );
    metrics::describe_counter!(
        "notification_failures_total",
        "Notifications the dispatcher failed to deliver"
    );
    metrics::describe_histogram!(
        "order_creation_duration_seconds",
        Unit::Seconds,
        "Time to price, reserve and persist a new order"
    );
}

/// GET /metrics: the Prometheus scrape.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        handle.render(),
    )
}
