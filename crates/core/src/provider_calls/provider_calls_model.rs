//! Call ledger models.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{errors::ValidationError, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Success,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Error => "error",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(CallStatus::Success),
            "error" => Ok(CallStatus::Error),
            other => Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Unknown call status '{other}'"
            )))),
        }
    }
}

/// One recorded aggregator call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCall {
    pub id: String,
    pub endpoint: String,
    pub user_id: Option<String>,
    pub connection_id: Option<String>,
    pub institution_id: Option<String>,
    pub duration_ms: i64,
    pub status: CallStatus,
    pub error_type: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProviderCall {
    pub endpoint: String,
    pub user_id: Option<String>,
    pub connection_id: Option<String>,
    pub institution_id: Option<String>,
    pub duration_ms: i64,
    pub status: CallStatus,
    pub error_type: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// Per institution and endpoint totals since a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCallSummary {
    pub institution_id: Option<String>,
    pub endpoint: String,
    pub total: i64,
    pub failures: i64,
    pub avg_duration_ms: f64,
}
