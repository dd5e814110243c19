//! Progress reporting for batch syncs.
//!
//! The server logs progress; other hosts can forward it to their own event
//! channel by implementing [`SyncProgressReporter`].

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::models::{AccountSyncResult, BatchSyncSummary};

/// Status of a sync operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Starting,
    Syncing,
    Complete,
    Skipped,
    Failed,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Starting => write!(f, "starting"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Complete => write!(f, "complete"),
            SyncStatus::Skipped => write!(f, "skipped"),
            SyncStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Payload for account progress events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgressPayload {
    pub account_id: String,
    pub connection_id: String,
    pub status: SyncStatus,
    /// Transactions downloaded so far
    pub transactions: usize,
    pub message: Option<String>,
}

impl SyncProgressPayload {
    pub fn new(
        account_id: impl Into<String>,
        connection_id: impl Into<String>,
        status: SyncStatus,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            connection_id: connection_id.into(),
            status,
            transactions: 0,
            message: None,
        }
    }

    /// Payload describing a finished account.
    pub fn finished(connection_id: impl Into<String>, result: &AccountSyncResult) -> Self {
        use super::models::AccountSyncStatus;
        let status = match result.status {
            AccountSyncStatus::Success => SyncStatus::Complete,
            AccountSyncStatus::Skipped => SyncStatus::Skipped,
            AccountSyncStatus::Error => SyncStatus::Failed,
        };
        let mut payload = Self::new(result.account_id.clone(), connection_id, status)
            .with_transactions(result.transactions);
        payload.message = result.error.clone();
        payload
    }

    pub fn with_transactions(mut self, count: usize) -> Self {
        self.transactions = count;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Trait for reporting sync progress.
pub trait SyncProgressReporter: Send + Sync {
    /// Report progress for an account sync.
    fn report_progress(&self, payload: SyncProgressPayload);

    /// Report that a batch is starting.
    fn report_sync_start(&self, accounts: usize);

    /// Report that a batch completed, with or without failures.
    fn report_sync_complete(&self, summary: &BatchSyncSummary);
}

/// A no-op progress reporter for contexts where progress reporting is not needed.
#[derive(Debug, Clone, Default)]
pub struct NoOpProgressReporter;

impl SyncProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _payload: SyncProgressPayload) {}

    fn report_sync_start(&self, _accounts: usize) {}

    fn report_sync_complete(&self, _summary: &BatchSyncSummary) {}
}

/// Writes progress to the log.
#[derive(Debug, Clone, Default)]
pub struct LoggingProgressReporter;

impl SyncProgressReporter for LoggingProgressReporter {
    fn report_progress(&self, payload: SyncProgressPayload) {
        debug!(
            "Account {} ({}): {} - {} transactions{}",
            payload.account_id,
            payload.connection_id,
            payload.status,
            payload.transactions,
            payload
                .message
                .map(|m| format!(" ({})", m))
                .unwrap_or_default()
        );
    }

    fn report_sync_start(&self, accounts: usize) {
        info!("Starting batch sync of {} account(s)", accounts);
    }

    fn report_sync_complete(&self, summary: &BatchSyncSummary) {
        info!(
            "Batch sync finished: {} synced, {} skipped, {} errors, {} transactions",
            summary.synced, summary.skipped, summary.errors, summary.total_transactions
        );
    }
}
