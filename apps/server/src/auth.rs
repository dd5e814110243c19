//! Caller identity set by the upstream authentication layer.

use axum::{extract::FromRequestParts, http::request::Parts};

use finlink_core::UserContext;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, taken from the `x-user-id` header.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserContext);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", USER_ID_HEADER)))?;
        Ok(CurrentUser(UserContext::new(user_id)))
    }
}
