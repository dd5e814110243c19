//! Classified aggregator errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the engine reacts to an aggregator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Connection-level; the user must re-authenticate. Never retried.
    CredentialInvalid,
    /// Retryable by the batch caller. Does not flag the connection.
    TransientRemote,
    /// Anything else. Logged with full context and surfaced per item.
    Unclassified,
}

/// Concrete failure reported by (or while talking to) the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderErrorKind {
    LoginRequired,
    InvalidAccessToken,
    ItemExpired,
    InstitutionDown,
    RateLimited,
    Timeout,
    Network,
    ServerError,
    MutationDuringPagination,
    InvalidRequest,
    Unclassified,
}

impl ProviderErrorKind {
    pub fn class(&self) -> ErrorClass {
        match self {
            ProviderErrorKind::LoginRequired
            | ProviderErrorKind::InvalidAccessToken
            | ProviderErrorKind::ItemExpired => ErrorClass::CredentialInvalid,
            ProviderErrorKind::InstitutionDown
            | ProviderErrorKind::RateLimited
            | ProviderErrorKind::Timeout
            | ProviderErrorKind::Network
            | ProviderErrorKind::ServerError
            | ProviderErrorKind::MutationDuringPagination => ErrorClass::TransientRemote,
            ProviderErrorKind::InvalidRequest | ProviderErrorKind::Unclassified => {
                ErrorClass::Unclassified
            }
        }
    }

    /// Maps an aggregator error body (and HTTP status, when known) to a kind.
    ///
    /// The error code wins over the error type, which wins over the status.
    pub fn from_api(
        error_type: Option<&str>,
        error_code: Option<&str>,
        http_status: Option<u16>,
    ) -> Self {
        if let Some(code) = error_code {
            match code {
                "ITEM_LOGIN_REQUIRED" | "INVALID_CREDENTIALS" | "ACCESS_NOT_GRANTED"
                | "INVALID_MFA" | "USER_SETUP_REQUIRED" => return ProviderErrorKind::LoginRequired,
                "INVALID_ACCESS_TOKEN" | "ITEM_NOT_FOUND" => {
                    return ProviderErrorKind::InvalidAccessToken
                }
                "ITEM_EXPIRED" | "PENDING_EXPIRATION" | "ITEM_CONSENT_EXPIRED" => {
                    return ProviderErrorKind::ItemExpired
                }
                "INSTITUTION_DOWN" | "INSTITUTION_NOT_RESPONDING"
                | "INSTITUTION_NOT_AVAILABLE" | "INSTITUTION_NO_LONGER_SUPPORTED"
                | "PRODUCT_NOT_READY" => return ProviderErrorKind::InstitutionDown,
                "RATE_LIMIT_EXCEEDED" | "TRANSACTIONS_LIMIT" | "ACCOUNTS_LIMIT"
                | "ITEM_GET_LIMIT" => return ProviderErrorKind::RateLimited,
                "TRANSACTIONS_SYNC_MUTATION_DURING_PAGINATION" => {
                    return ProviderErrorKind::MutationDuringPagination
                }
                "INTERNAL_SERVER_ERROR" | "PLANNED_MAINTENANCE" => {
                    return ProviderErrorKind::ServerError
                }
                _ => {}
            }
        }

        match error_type {
            Some("RATE_LIMIT_EXCEEDED") => return ProviderErrorKind::RateLimited,
            Some("INSTITUTION_ERROR") => return ProviderErrorKind::InstitutionDown,
            Some("API_ERROR") => return ProviderErrorKind::ServerError,
            Some("INVALID_REQUEST") | Some("INVALID_INPUT") => {
                return ProviderErrorKind::InvalidRequest
            }
            _ => {}
        }

        match http_status {
            Some(429) => ProviderErrorKind::RateLimited,
            Some(status) if status >= 500 => ProviderErrorKind::ServerError,
            Some(400) => ProviderErrorKind::InvalidRequest,
            _ => ProviderErrorKind::Unclassified,
        }
    }
}

/// Error returned by the aggregator client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({kind:?})")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    /// Raw aggregator error code, when the aggregator sent one.
    pub code: Option<String>,
    /// Raw aggregator error type, when the aggregator sent one.
    pub error_type: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            error_type: None,
            message: message.into(),
        }
    }

    pub fn from_api(
        http_status: Option<u16>,
        error_type: Option<String>,
        error_code: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        let kind =
            ProviderErrorKind::from_api(error_type.as_deref(), error_code.as_deref(), http_status);
        Self {
            kind,
            code: error_code,
            error_type,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }

    pub fn is_credential_invalid(&self) -> bool {
        self.class() == ErrorClass::CredentialInvalid
    }

    /// Stable label recorded in the call ledger.
    pub fn label(&self) -> String {
        self.code
            .clone()
            .or_else(|| self.error_type.clone())
            .unwrap_or_else(|| {
                serde_json::to_value(self.kind)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_else(|| format!("{:?}", self.kind))
            })
    }
}
