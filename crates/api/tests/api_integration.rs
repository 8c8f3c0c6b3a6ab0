//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::config::Config;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use checkout::{LoggingDispatcher, NotificationOutbox, PaymentSigner};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::{InMemoryCatalogStore, InMemoryDocumentStore};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "api_test_secret";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    let config = Config {
        payment_key_secret: SECRET.to_string(),
        ..Config::default()
    };
    let (outbox, _worker) = NotificationOutbox::spawn(LoggingDispatcher, 64);
    let state = api::create_state(
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(InMemoryCatalogStore::new()),
        &config,
        outbox,
    );
    api::create_app(state, get_metrics_handle())
}

#[derive(Clone, Copy)]
enum As {
    Anonymous,
    Customer(Uuid),
    Admin(Uuid),
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    who: As,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    match who {
        As::Anonymous => {}
        As::Customer(id) => {
            builder = builder.header("x-user-id", id.to_string());
        }
        As::Admin(id) => {
            builder = builder
                .header("x-user-id", id.to_string())
                .header("x-user-role", "admin");
        }
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn admin() -> As {
    As::Admin(Uuid::new_v4())
}

async fn seed_catalog(app: &axum::Router) {
    let (status, _) = send(
        app,
        "PUT",
        "/products/PANEER",
        admin(),
        Some(json!({
            "name": "Paneer",
            "price": 9000,
            "stock": 5,
            "variants": [
                { "id": "500g", "label": "500 g", "price": 21000, "stock": 2 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

fn address() -> Value {
    json!({
        "full_name": "Kavya Iyer",
        "phone": "9833333333",
        "line1": "4 Lake View",
        "city": "Bengaluru",
        "postal_code": "560001"
    })
}

async fn place_order(app: &axum::Router, who: As, method: &str, quantity: u32) -> Value {
    let (status, order) = send(
        app,
        "POST",
        "/orders",
        who,
        Some(json!({
            "items": [{ "product_id": "PANEER", "quantity": quantity }],
            "payment_method": method,
            "shipping_address": address(),
            "distance_km": 2.5
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    order
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = send(&app, "GET", "/health", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "storefront-api");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_requests_without_identity_are_unauthenticated() {
    let app = setup();
    let (status, json) = send(&app, "GET", "/cart", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_products_are_admin_managed() {
    let app = setup();
    let customer = As::Customer(Uuid::new_v4());

    let (status, json) = send(
        &app,
        "PUT",
        "/products/PANEER",
        customer,
        Some(json!({ "name": "Paneer", "price": 9000, "stock": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "FORBIDDEN");

    seed_catalog(&app).await;
    let (status, json) = send(&app, "GET", "/products/PANEER", customer, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["price"], 9000);
    assert_eq!(json["variants"][0]["stock"], 2);

    let (status, json) = send(&app, "GET", "/products/GHEE", customer, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_cart_flow() {
    let app = setup();
    seed_catalog(&app).await;
    let me = As::Customer(Uuid::new_v4());

    let (status, cart) = send(
        &app,
        "POST",
        "/cart/items",
        me,
        Some(json!({ "product_id": "PANEER", "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_amount"], 18000);

    let (status, cart) = send(
        &app,
        "POST",
        "/cart/items",
        me,
        Some(json!({ "product_id": "PANEER", "variant_id": "500g", "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 2);
    assert_eq!(cart["total_amount"], 39000);

    let (status, err) = send(
        &app,
        "POST",
        "/cart/items",
        me,
        Some(json!({ "product_id": "PANEER", "quantity": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"]["code"], "INSUFFICIENT_STOCK");
    assert_eq!(err["error"]["details"]["requested"], 6);
    assert_eq!(err["error"]["details"]["available"], 5);

    let (status, cart) = send(
        &app,
        "PUT",
        "/cart/items",
        me,
        Some(json!({ "product_id": "PANEER", "quantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["total_amount"], 21000);

    let (status, err) = send(
        &app,
        "DELETE",
        "/cart/items",
        me,
        Some(json!({ "product_id": "PANEER" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "NOT_FOUND");

    let (status, cart) = send(&app, "DELETE", "/cart", me, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["item_count"], 0);
}

#[tokio::test]
async fn test_cash_order_and_cancellation() {
    let app = setup();
    seed_catalog(&app).await;
    let me = As::Customer(Uuid::new_v4());

    let order = place_order(&app, me, "cod", 3).await;
    assert_eq!(order["status"], "CREATED");
    assert_eq!(order["total_amount"], 27000);
    let id = order["id"].as_str().unwrap().to_string();

    let (status, listed) = send(&app, "GET", "/orders", me, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (_, product) = send(&app, "GET", "/products/PANEER", me, None).await;
    assert_eq!(product["stock"], 2);

    let (status, cancelled) = send(&app, "POST", &format!("/orders/{id}/cancel"), me, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");

    let (_, product) = send(&app, "GET", "/products/PANEER", me, None).await;
    assert_eq!(product["stock"], 5);

    let (status, err) = send(&app, "POST", &format!("/orders/{id}/cancel"), me, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"]["code"], "INVALID_TRANSITION");
    assert_eq!(err["error"]["details"]["from"], "CANCELLED");
    assert_eq!(err["error"]["details"]["to"], "CANCELLED");

    let (status, _) = send(&app, "POST", &format!("/orders/{id}/hide"), me, None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, listed) = send(&app, "GET", "/orders", me, None).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_second_order_for_the_same_stock_is_rejected() {
    let app = setup();
    seed_catalog(&app).await;

    place_order(&app, As::Customer(Uuid::new_v4()), "cod", 3).await;
    let (status, err) = send(
        &app,
        "POST",
        "/orders",
        As::Customer(Uuid::new_v4()),
        Some(json!({
            "items": [{ "product_id": "PANEER", "quantity": 3 }],
            "payment_method": "cod",
            "shipping_address": address()
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"]["code"], "INSUFFICIENT_STOCK");
    assert_eq!(err["error"]["details"]["product_id"], "PANEER");
    assert_eq!(err["error"]["details"]["available"], 2);
}

#[tokio::test]
async fn test_gateway_payment_flow() {
    let app = setup();
    seed_catalog(&app).await;
    let me = As::Customer(Uuid::new_v4());

    let order = place_order(&app, me, "gateway", 1).await;
    assert_eq!(order["status"], "PAYMENT_PENDING");
    let id = order["id"].as_str().unwrap().to_string();

    let (status, intent) = send(
        &app,
        "POST",
        &format!("/orders/{id}/payment-intent"),
        me,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(intent["amount"], 9000);
    assert_eq!(intent["currency"], "INR");
    assert_eq!(intent["receipt"], order["order_number"]);
    let gateway_order_id = intent["gateway_order_id"].as_str().unwrap().to_string();

    let (status, err) = send(
        &app,
        "POST",
        "/payments/verify",
        me,
        Some(json!({
            "order_id": id,
            "gateway_order_id": gateway_order_id,
            "payment_id": "pay_1",
            "signature": "00".repeat(32)
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "INVALID_PAYMENT_SIGNATURE");

    let (_, stored) = send(&app, "GET", &format!("/orders/{id}"), me, None).await;
    assert_eq!(stored["payment_status"], "failed");
    assert_eq!(stored["status"], "PAYMENT_PENDING");

    let signature = PaymentSigner::new(SECRET)
        .sign(&gateway_order_id, "pay_1")
        .unwrap();
    let (status, paid) = send(
        &app,
        "POST",
        "/payments/verify",
        me,
        Some(json!({
            "order_id": id,
            "gateway_order_id": gateway_order_id,
            "payment_id": "pay_1",
            "signature": signature
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "PAID");
    assert_eq!(paid["payment_status"], "paid");
    assert_eq!(paid["payment_id"], "pay_1");
}

#[tokio::test]
async fn test_verify_requires_every_field() {
    let app = setup();
    seed_catalog(&app).await;
    let me = As::Customer(Uuid::new_v4());
    let order = place_order(&app, me, "gateway", 1).await;

    let (status, err) = send(
        &app,
        "POST",
        "/payments/verify",
        me,
        Some(json!({ "order_id": order["id"], "payment_id": "pay_1" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_admin_status_updates() {
    let app = setup();
    seed_catalog(&app).await;
    let me = As::Customer(Uuid::new_v4());
    let order = place_order(&app, me, "cod", 1).await;
    let uri = format!("/orders/{}/status", order["id"].as_str().unwrap());

    let (status, _) = send(&app, "PUT", &uri, me, Some(json!({ "status": "SHIPPED" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) =
        send(&app, "PUT", &uri, admin(), Some(json!({ "status": "confirmed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "ADMIN_CONFIRMED");

    let (status, err) =
        send(&app, "PUT", &uri, admin(), Some(json!({ "status": "teleported" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "VALIDATION_ERROR");

    let (status, err) =
        send(&app, "PUT", &uri, admin(), Some(json!({ "status": "delivered" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"]["details"]["from"], "ADMIN_CONFIRMED");
    assert_eq!(err["error"]["details"]["to"], "DELIVERED");

    let (status, cancelled) =
        send(&app, "PUT", &uri, admin(), Some(json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");
    let (_, product) = send(&app, "GET", "/products/PANEER", me, None).await;
    assert_eq!(product["stock"], 5);
}

#[tokio::test]
async fn test_order_access_rules() {
    let app = setup();
    seed_catalog(&app).await;
    let owner = As::Customer(Uuid::new_v4());
    let stranger = As::Customer(Uuid::new_v4());
    let order = place_order(&app, owner, "cod", 1).await;
    let uri = format!("/orders/{}", order["id"].as_str().unwrap());

    let (status, _) = send(&app, "GET", &uri, stranger, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "GET", &uri, admin(), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/orders?all=true", stranger, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, all) = send(&app, "GET", "/orders?all=true", admin(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 1);

    let (status, err) = send(&app, "GET", "/orders/not-a-uuid", owner, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "VALIDATION_ERROR");

    let (status, err) = send(
        &app,
        "GET",
        &format!("/orders/{}", Uuid::new_v4()),
        owner,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_body_is_a_validation_error() {
    let app = setup();
    let me = As::Customer(Uuid::new_v4());

    let (status, err) = send(
        &app,
        "POST",
        "/orders",
        me,
        Some(json!({ "items": "lots" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_out_of_range_numbers_are_validation_errors() {
    let app = setup();
    seed_catalog(&app).await;
    let me = As::Customer(Uuid::new_v4());

    let (status, err) = send(
        &app,
        "POST",
        "/orders",
        me,
        Some(json!({
            "items": [
                { "product_id": "PANEER", "quantity": u32::MAX },
                { "product_id": "PANEER", "quantity": 1 }
            ],
            "payment_method": "cod",
            "shipping_address": address()
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "VALIDATION_ERROR");

    let (status, err) = send(
        &app,
        "POST",
        "/orders",
        me,
        Some(json!({
            "items": [{ "product_id": "PANEER", "quantity": 1 }],
            "payment_method": "cod",
            "shipping_address": address(),
            "distance_km": 1e300
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "VALIDATION_ERROR");

    let (_, product) = send(&app, "GET", "/products/PANEER", me, None).await;
    assert_eq!(product["stock"], 5);
}

#[tokio::test]
async fn test_admin_cannot_mark_an_order_paid() {
    let app = setup();
    seed_catalog(&app).await;
    let me = As::Customer(Uuid::new_v4());
    let order = place_order(&app, me, "gateway", 1).await;
    let id = order["id"].as_str().unwrap().to_string();

    let (status, err) = send(
        &app,
        "PUT",
        &format!("/orders/{id}/status"),
        admin(),
        Some(json!({ "status": "PAID" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"]["code"], "INVALID_TRANSITION");
    assert_eq!(err["error"]["details"]["from"], "PAYMENT_PENDING");
    assert_eq!(err["error"]["details"]["to"], "PAID");

    let (_, stored) = send(&app, "GET", &format!("/orders/{id}"), me, None).await;
    assert_eq!(stored["status"], "PAYMENT_PENDING");
    assert_eq!(stored["payment_status"], "pending");
    assert!(stored["payment_id"].is_null());
}
