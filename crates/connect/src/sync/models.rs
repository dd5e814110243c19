//! Batch sync configuration and result types.

use serde::{Deserialize, Serialize};

use finlink_core::sync::{SyncOutcome, SyncRunStatus};

/// Configuration for transaction sync.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Transactions requested per `transactions/sync` page.
    pub page_size: u32,
    /// Maximum number of pages per invocation (safety limit).
    pub max_pages: usize,
    /// Restarts allowed when the aggregator reports a mutation during pagination.
    pub max_pagination_restarts: u32,
    /// Consecutive zero-progress invocations that count as a stall.
    pub stall_threshold: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 500,
            max_pages: 1_000,
            max_pagination_restarts: 2,
            stall_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountSyncStatus {
    Success,
    Error,
    Skipped,
}

/// Per-account entry of a batch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSyncResult {
    pub account_id: String,
    pub status: AccountSyncStatus,
    /// Added plus modified transactions downloaded.
    pub transactions: usize,
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    pub cursor_advanced: bool,
    pub stalled: bool,
    /// Attempts made, including retries.
    pub attempts: u32,
    pub error: Option<String>,
}

impl AccountSyncResult {
    pub fn from_outcome(outcome: SyncOutcome, attempts: u32) -> Self {
        let status = match outcome.status {
            SyncRunStatus::Completed => AccountSyncStatus::Success,
            SyncRunStatus::ReauthRequired => AccountSyncStatus::Error,
        };
        Self {
            account_id: outcome.account_id,
            status,
            transactions: outcome.downloaded,
            inserted: outcome.inserted,
            updated: outcome.updated,
            removed: outcome.removed,
            cursor_advanced: outcome.cursor_advanced,
            stalled: outcome.stalled,
            attempts,
            error: outcome.error,
        }
    }

    pub fn skipped(account_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::empty(account_id, AccountSyncStatus::Skipped, 0, reason)
    }

    pub fn failed(account_id: impl Into<String>, attempts: u32, error: impl Into<String>) -> Self {
        Self::empty(account_id, AccountSyncStatus::Error, attempts, error)
    }

    fn empty(
        account_id: impl Into<String>,
        status: AccountSyncStatus,
        attempts: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            status,
            transactions: 0,
            inserted: 0,
            updated: 0,
            removed: 0,
            cursor_advanced: false,
            stalled: false,
            attempts,
            error: Some(message.into()),
        }
    }
}

/// Response of a batch sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSyncSummary {
    pub synced: usize,
    pub skipped: usize,
    pub errors: usize,
    pub total_transactions: usize,
    pub results: Vec<AccountSyncResult>,
}

impl BatchSyncSummary {
    pub fn push(&mut self, result: AccountSyncResult) {
        match result.status {
            AccountSyncStatus::Success => {
                self.synced += 1;
                self.total_transactions += result.transactions;
            }
            AccountSyncStatus::Skipped => self.skipped += 1,
            AccountSyncStatus::Error => self.errors += 1,
        }
        self.results.push(result);
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = AccountSyncResult>) {
        for result in results {
            self.push(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finlink_core::sync::SyncMode;

    fn completed(account_id: &str, downloaded: usize) -> SyncOutcome {
        SyncOutcome {
            account_id: account_id.to_string(),
            mode: SyncMode::Incremental,
            status: SyncRunStatus::Completed,
            downloaded,
            inserted: downloaded,
            updated: 0,
            removed: 0,
            pages: 1,
            cursor_advanced: true,
            stalled: false,
            error: None,
        }
    }

    #[test]
    fn summary_counts_follow_item_status() {
        let mut summary = BatchSyncSummary::default();
        summary.push(AccountSyncResult::from_outcome(completed("a", 12), 1));
        summary.push(AccountSyncResult::skipped("b", "manual connection"));
        summary.push(AccountSyncResult::failed("c", 3, "INSTITUTION_DOWN"));

        assert_eq!(summary.synced, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.total_transactions, 12);
        assert_eq!(summary.results.len(), 3);
    }

    #[test]
    fn reauth_outcome_is_an_error_item() {
        let outcome = SyncOutcome::reauth_required(
            "acc-1",
            SyncMode::Full,
            0,
            "ITEM_LOGIN_REQUIRED".to_string(),
        );
        let result = AccountSyncResult::from_outcome(outcome, 1);
        assert_eq!(result.status, AccountSyncStatus::Error);
        assert_eq!(result.error.as_deref(), Some("ITEM_LOGIN_REQUIRED"));
    }

    #[test]
    fn batch_response_uses_camel_case() {
        let mut summary = BatchSyncSummary::default();
        summary.push(AccountSyncResult::skipped("acc-1", "archived"));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["totalTransactions"], 0);
        assert_eq!(json["results"][0]["accountId"], "acc-1");
        assert_eq!(json["results"][0]["status"], "skipped");
    }
}
