//! Transaction sync models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::download_log_model::{NewDownloadLog, SyncMode};
use crate::transactions::TransactionUpsert;

/// Errors raised by the transaction sync itself (not by the aggregator).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The account or its connection cannot be synced right now.
    #[error("Account is not eligible for sync: {0}")]
    Ineligible(String),

    #[error("Pagination exceeded {0} pages")]
    PageBudgetExceeded(usize),

    #[error("Aggregator returned the same cursor while reporting more pages")]
    CursorStuck,

    #[error("Data kept changing during pagination after {0} restarts")]
    PaginationRestartsExhausted(u32),
}

/// Everything a successful download writes, applied in one store transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCommit {
    pub account_id: String,
    /// Added and modified transactions, last write per remote id wins.
    pub upserts: Vec<TransactionUpsert>,
    /// Remote transaction ids to hard-delete.
    pub removed: Vec<String>,
    pub next_cursor: String,
    pub log: NewDownloadLog,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCommitResult {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    Completed,
    /// The connection was flagged; nothing was written except the log row.
    ReauthRequired,
}

/// What one `sync` call did for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub account_id: String,
    pub mode: SyncMode,
    pub status: SyncRunStatus,
    /// Added plus modified transactions received
    pub downloaded: usize,
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    pub pages: usize,
    pub cursor_advanced: bool,
    /// The last few invocations for this account all made no progress.
    pub stalled: bool,
    pub error: Option<String>,
}

impl SyncOutcome {
    pub fn reauth_required(account_id: &str, mode: SyncMode, pages: usize, error: String) -> Self {
        Self {
            account_id: account_id.to_string(),
            mode,
            status: SyncRunStatus::ReauthRequired,
            downloaded: 0,
            inserted: 0,
            updated: 0,
            removed: 0,
            pages,
            cursor_advanced: false,
            stalled: false,
            error: Some(error),
        }
    }
}
