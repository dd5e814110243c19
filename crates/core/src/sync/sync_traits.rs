use async_trait::async_trait;

use super::download_log_model::{DownloadLog, NewDownloadLog};
use super::sync_model::{SyncCommit, SyncCommitResult};
use crate::errors::Result;

/// Store operations used by the transaction sync.
#[async_trait]
pub trait SyncStoreTrait: Send + Sync {
    /// Applies upserts and deletions, advances the cursor and writes the log,
    /// all in one transaction.
    async fn commit_sync(&self, commit: SyncCommit) -> Result<SyncCommitResult>;

    /// Writes a failure log row. The account's cursor is not touched.
    async fn record_failure(&self, log: NewDownloadLog) -> Result<()>;

    /// Most recent logs for one account, newest first.
    fn recent_logs(&self, account_id: &str, limit: i64) -> Result<Vec<DownloadLog>>;
}
