//! Institution connection domain models.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::providers::PROVIDER_MANUAL;
use crate::{errors::ValidationError, Error, Result};

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Active,
    /// The user removed the institution; the credential is gone.
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Active => "active",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(ConnectionStatus::Active),
            "disconnected" => Ok(ConnectionStatus::Disconnected),
            other => Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Unknown connection status '{other}'"
            )))),
        }
    }
}

/// One authorised login at one institution (an aggregator "item").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionConnection {
    pub id: String,
    pub user_id: String,
    /// Aggregator item id. Unique across all connections.
    pub item_id: String,
    /// Per-connection credential. Never serialized to clients.
    #[serde(skip_serializing, default)]
    pub access_token: String,
    pub institution_id: String,
    pub institution_name: Option<String>,
    pub institution_logo: Option<String>,
    pub provider: String,
    pub status: ConnectionStatus,
    pub reauth_required: bool,
    pub reauth_requested_at: Option<NaiveDateTime>,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl InstitutionConnection {
    pub fn is_manual(&self) -> bool {
        self.provider == PROVIDER_MANUAL
    }

    /// Active, aggregator-backed and not waiting for re-authentication.
    pub fn is_usable(&self) -> bool {
        !self.is_manual() && self.status == ConnectionStatus::Active && !self.reauth_required
    }

    /// Reason this connection cannot be synced, if any.
    pub fn ineligibility_reason(&self) -> Option<&'static str> {
        if self.is_manual() {
            Some("manual connection")
        } else if self.status == ConnectionStatus::Disconnected {
            Some("connection is disconnected")
        } else if self.reauth_required {
            Some("connection requires re-authentication")
        } else {
            None
        }
    }
}

/// Input model for creating a connection after a token exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConnection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub item_id: String,
    pub access_token: String,
    pub institution_id: String,
    pub institution_name: Option<String>,
    pub institution_logo: Option<String>,
    pub provider: String,
}

impl NewConnection {
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "userId".to_string(),
            )));
        }
        if self.item_id.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "itemId".to_string(),
            )));
        }
        if self.institution_id.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "institutionId".to_string(),
            )));
        }
        if self.provider != PROVIDER_MANUAL && self.access_token.trim().is_empty() {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Aggregator connections need an access token".to_string(),
            )));
        }
        Ok(())
    }
}
