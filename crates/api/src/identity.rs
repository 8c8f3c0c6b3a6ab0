//! Caller identity from trusted gateway headers.
//!
//! An upstream proxy authenticates users and forwards `x-user-id` (UUID) and
//! `x-user-role` (`customer` or `admin`). The headers are trusted as-is.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use checkout::{Caller, Role};
use common::UserId;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
        };

        let user_id = header(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthenticated(format!("missing {USER_ID_HEADER} header")))?;
        let user_id = uuid::Uuid::parse_str(user_id)
            .map(UserId::from_uuid)
            .map_err(|_| ApiError::Unauthenticated(format!("{USER_ID_HEADER} must be a UUID")))?;

        let role = match header(USER_ROLE_HEADER) {
            None | Some("customer") => Role::Customer,
            Some("admin") => Role::Admin,
            Some(other) => {
                return Err(ApiError::Unauthenticated(format!("unknown role {other}")));
            }
        };

        Ok(Identity(Caller { user_id, role }))
    }
}
