//! Mapping of engine errors onto HTTP responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use finlink_core::errors::Error as CoreError;
use finlink_core::limits::RateLimitStatus;
use finlink_core::sync::SyncError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Manual sync limit reached")]
    RateLimited(RateLimitStatus),

    /// The aggregator rejected or failed the call.
    #[error("{message}")]
    Upstream {
        code: Option<String>,
        message: String,
    },

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reset_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining: Option<u32>,
}

impl ErrorBody {
    fn new(error: &'static str, message: String) -> Self {
        Self {
            error,
            message,
            code: None,
            reset_time: None,
            limit: None,
            remaining: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body, retry_after) = match self {
            ApiError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("bad_request", message),
                None,
            ),
            ApiError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new("unauthorized", message),
                None,
            ),
            ApiError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                ErrorBody::new("not_found", message),
                None,
            ),
            ApiError::Conflict(_) => (
                StatusCode::CONFLICT,
                ErrorBody::new("conflict", message),
                None,
            ),
            ApiError::RateLimited(status) => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody {
                    reset_time: Some(status.reset_time),
                    limit: Some(status.limit),
                    remaining: Some(status.remaining),
                    ..ErrorBody::new("rate_limited", message)
                },
                Some(status.retry_after_secs(Utc::now())),
            ),
            ApiError::Upstream { code, .. } => (
                StatusCode::BAD_GATEWAY,
                ErrorBody {
                    code,
                    ..ErrorBody::new("upstream_error", message)
                },
                None,
            ),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new("internal_error", message),
                None,
            ),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => ApiError::BadRequest(e.to_string()),
            CoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            CoreError::Conflict(msg) => ApiError::Conflict(msg),
            CoreError::Sync(SyncError::Ineligible(reason)) => ApiError::Conflict(reason),
            CoreError::RateLimited(status) => ApiError::RateLimited(status),
            CoreError::Provider(provider) => ApiError::Upstream {
                code: Some(provider.label()),
                message: provider.message,
            },
            other => {
                error!("Request failed: {}", other);
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("Request failed: {:#}", err);
        ApiError::Internal("Internal server error".to_string())
    }
}
