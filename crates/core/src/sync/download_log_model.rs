//! Download log domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{errors::ValidationError, Error, Result};

/// How the transaction download started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// From the persisted cursor
    Incremental,
    /// From no cursor (full history)
    Full,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Incremental => "incremental",
            SyncMode::Full => "full",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "incremental" => Ok(SyncMode::Incremental),
            "full" => Ok(SyncMode::Full),
            other => Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Unknown sync mode '{other}'"
            )))),
        }
    }
}

/// Result of one sync invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadOutcome {
    Success,
    ReauthRequired,
    Failed,
}

impl DownloadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadOutcome::Success => "success",
            DownloadOutcome::ReauthRequired => "reauth_required",
            DownloadOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(DownloadOutcome::Success),
            "reauth_required" => Ok(DownloadOutcome::ReauthRequired),
            "failed" => Ok(DownloadOutcome::Failed),
            other => Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Unknown download outcome '{other}'"
            )))),
        }
    }
}

/// One row per sync invocation per account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLog {
    pub id: String,
    pub account_id: String,
    pub mode: SyncMode,
    pub outcome: DownloadOutcome,
    pub added: i32,
    pub modified: i32,
    pub removed: i32,
    /// Added plus modified transactions received
    pub downloaded: i32,
    pub pages: i32,
    pub cursor_before: Option<String>,
    pub cursor_after: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DownloadLog {
    /// A run made progress when it succeeded and came back with a cursor.
    pub fn made_progress(&self) -> bool {
        self.outcome == DownloadOutcome::Success
            && self
                .cursor_after
                .as_deref()
                .map(|c| !c.is_empty())
                .unwrap_or(false)
    }
}

/// Input model for a download log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDownloadLog {
    pub account_id: String,
    pub mode: SyncMode,
    pub outcome: DownloadOutcome,
    pub added: i32,
    pub modified: i32,
    pub removed: i32,
    pub downloaded: i32,
    pub pages: i32,
    pub cursor_before: Option<String>,
    pub cursor_after: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl NewDownloadLog {
    /// A successful run; counts are filled in by the caller.
    pub fn success(
        account_id: &str,
        mode: SyncMode,
        cursor_before: Option<String>,
        cursor_after: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id: account_id.to_string(),
            mode,
            outcome: DownloadOutcome::Success,
            added: 0,
            modified: 0,
            removed: 0,
            downloaded: 0,
            pages: 0,
            cursor_before,
            cursor_after: Some(cursor_after),
            error: None,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// A failed or re-auth run. The cursor did not move.
    pub fn failure(
        account_id: &str,
        mode: SyncMode,
        outcome: DownloadOutcome,
        cursor_before: Option<String>,
        pages: i32,
        error: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id: account_id.to_string(),
            mode,
            outcome,
            added: 0,
            modified: 0,
            removed: 0,
            downloaded: 0,
            pages,
            cursor_after: cursor_before.clone(),
            cursor_before,
            error: Some(error),
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// True when each of the newest `threshold` logs made no progress.
///
/// `logs` must be ordered newest first. Fewer than `threshold` logs never count
/// as a stall.
pub fn is_stalled(logs: &[DownloadLog], threshold: usize) -> bool {
    threshold > 0
        && logs.len() >= threshold
        && logs.iter().take(threshold).all(|log| !log.made_progress())
}
