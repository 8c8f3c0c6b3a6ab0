//! API error types with HTTP response mapping.
//!
//! Every error body has the shape
//! `{ "error": { "code": "...", "message": "...", "details": {...} } }`,
//! where `code` is stable and `details` is present only for stock and
//! transition errors.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::{CartError, DomainError, OrderError};
use serde_json::{Value, json};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// A checkout, order or cart operation failed.
    Checkout(CheckoutError),
    /// The caller could not be identified.
    Unauthenticated(String),
    /// The request could not be parsed.
    BadRequest(String),
    /// Internal server error.
    Internal(String),
}

struct ErrorBody {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

impl ErrorBody {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    fn internal(message: impl std::fmt::Display) -> Self {
        tracing::error!(error = %message, "internal server error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self {
            ApiError::Checkout(err) => checkout_error_body(err),
            ApiError::Unauthenticated(msg) => {
                ErrorBody::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", msg)
            }
            ApiError::BadRequest(msg) => {
                ErrorBody::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
            }
            ApiError::Internal(msg) => ErrorBody::internal(msg),
        };

        let mut error = json!({ "code": body.code, "message": body.message });
        if let Some(details) = body.details {
            error["details"] = details;
        }
        (body.status, axum::Json(json!({ "error": error }))).into_response()
    }
}

fn checkout_error_body(err: CheckoutError) -> ErrorBody {
    let message = err.to_string();
    match err {
        CheckoutError::Domain(domain) => domain_error_body(domain),
        CheckoutError::InvalidPaymentSignature { .. } => ErrorBody::new(
            StatusCode::BAD_REQUEST,
            "INVALID_PAYMENT_SIGNATURE",
            message,
        ),
        CheckoutError::Forbidden(_) => ErrorBody::new(StatusCode::FORBIDDEN, "FORBIDDEN", message),
        CheckoutError::Gateway(_) | CheckoutError::Settings(_) => ErrorBody::internal(message),
    }
}

fn domain_error_body(err: DomainError) -> ErrorBody {
    let message = err.to_string();
    match err {
        DomainError::NotFound { .. } => ErrorBody::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
        DomainError::InsufficientStock {
            product_id,
            variant_id,
            requested,
            available,
        } => insufficient_stock(message, json!({
            "product_id": product_id,
            "variant_id": variant_id,
            "requested": requested,
            "available": available,
        })),
        DomainError::ConcurrentModification { .. } => {
            ErrorBody::new(StatusCode::CONFLICT, "CONCURRENT_MODIFICATION", message)
        }
        DomainError::Validation(_) => {
            ErrorBody::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
        }
        DomainError::Order(order) => order_error_body(order, message),
        DomainError::Cart(cart) => match cart {
            CartError::InvalidQuantity { .. } => {
                ErrorBody::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
            }
            CartError::ItemNotFound { .. } => {
                ErrorBody::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
            }
            CartError::InsufficientStock {
                product_id,
                variant_id,
                requested,
                available,
            } => insufficient_stock(message, json!({
                "product_id": product_id,
                "variant_id": variant_id,
                "requested": requested,
                "available": available,
            })),
        },
        DomainError::Store(_) | DomainError::Serialization(_) => ErrorBody::internal(message),
    }
}

fn order_error_body(err: OrderError, message: String) -> ErrorBody {
    match err {
        OrderError::InvalidTransition { from, to } => invalid_transition(message)
            .with_details(json!({ "from": from, "to": to })),
        OrderError::NotHideable { status } => {
            invalid_transition(message).with_details(json!({ "from": status }))
        }
        OrderError::AlreadyPaid => invalid_transition(message),
        OrderError::NoLines
        | OrderError::InvalidQuantity { .. }
        | OrderError::NegativeDeliveryCharge(_)
        | OrderError::IncompleteAddress { .. }
        | OrderError::AmountOverflow { .. } => {
            ErrorBody::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
        }
        OrderError::AlreadyCreated => {
            ErrorBody::new(StatusCode::CONFLICT, "CONCURRENT_MODIFICATION", message)
        }
        OrderError::NotPlaced => ErrorBody::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
    }
}

fn insufficient_stock(message: String, details: Value) -> ErrorBody {
    ErrorBody::new(StatusCode::CONFLICT, "INSUFFICIENT_STOCK", message).with_details(details)
}

fn invalid_transition(message: String) -> ErrorBody {
    ErrorBody::new(StatusCode::CONFLICT, "INVALID_TRANSITION", message)
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Checkout(CheckoutError::Domain(err))
    }
}

impl From<store::StoreError> for ApiError {
    fn from(err: store::StoreError) -> Self {
        ApiError::Checkout(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
