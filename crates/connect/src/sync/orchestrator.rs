//! Batch transaction sync.
//!
//! Accounts are grouped by connection. Groups run concurrently up to the
//! configured worker count; accounts inside a group run one after another so a
//! single credential never has two downloads in flight.

use futures::stream::{self, StreamExt};
use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use finlink_core::accounts::{Account, AccountRepositoryTrait};
use finlink_core::connections::ConnectionRepositoryTrait;
use finlink_core::errors::{Error, Result};
use finlink_core::sync::SyncError;
use finlink_core::UserContext;

use super::models::{AccountSyncResult, BatchSyncSummary};
use super::progress::{SyncProgressPayload, SyncProgressReporter, SyncStatus};
use super::retry::RetryPolicy;
use super::service::TransactionSyncServiceTrait;

/// Orchestrates batch syncs on top of [`TransactionSyncServiceTrait`].
///
/// # Example
///
/// ```ignore
/// let orchestrator = SyncOrchestrator::new(
///     sync_service,
///     account_repository,
///     connection_repository,
///     Arc::new(LoggingProgressReporter),
///     RetryPolicy::default(),
///     4,
/// );
/// let summary = orchestrator.sync_user(&ctx, false, &CancellationToken::new()).await?;
/// ```
pub struct SyncOrchestrator<P: SyncProgressReporter> {
    sync_service: Arc<dyn TransactionSyncServiceTrait>,
    account_repository: Arc<dyn AccountRepositoryTrait>,
    connection_repository: Arc<dyn ConnectionRepositoryTrait>,
    progress_reporter: Arc<P>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl<P: SyncProgressReporter> SyncOrchestrator<P> {
    pub fn new(
        sync_service: Arc<dyn TransactionSyncServiceTrait>,
        account_repository: Arc<dyn AccountRepositoryTrait>,
        connection_repository: Arc<dyn ConnectionRepositoryTrait>,
        progress_reporter: Arc<P>,
        retry: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            sync_service,
            account_repository,
            connection_repository,
            progress_reporter,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    /// Syncs one account with retries and maps the result to a batch item.
    pub async fn sync_account(
        &self,
        ctx: &UserContext,
        account_id: &str,
        force_full_resync: bool,
    ) -> AccountSyncResult {
        let label = format!("sync of account {}", account_id);
        let (result, attempts) = self
            .retry
            .execute(&label, || {
                self.sync_service.sync(ctx, account_id, force_full_resync)
            })
            .await;

        match result {
            Ok(outcome) => AccountSyncResult::from_outcome(outcome, attempts),
            Err(Error::Sync(SyncError::Ineligible(reason))) => {
                AccountSyncResult::skipped(account_id, reason)
            }
            Err(err) => AccountSyncResult::failed(account_id, attempts, err.to_string()),
        }
    }

    /// Syncs every non-archived account of the user.
    pub async fn sync_user(
        &self,
        ctx: &UserContext,
        force_full_resync: bool,
        cancel: &CancellationToken,
    ) -> Result<BatchSyncSummary> {
        let accounts = self.account_repository.list_for_user(ctx.user_id(), false)?;
        Ok(self
            .sync_accounts(ctx, accounts, force_full_resync, cancel)
            .await)
    }

    /// Syncs the given accounts. Never fails as a whole; failures are per item.
    pub async fn sync_accounts(
        &self,
        ctx: &UserContext,
        accounts: Vec<Account>,
        force_full_resync: bool,
        cancel: &CancellationToken,
    ) -> BatchSyncSummary {
        self.progress_reporter.report_sync_start(accounts.len());

        let mut groups: BTreeMap<String, Vec<Account>> = BTreeMap::new();
        for account in accounts {
            groups
                .entry(account.connection_id.clone())
                .or_default()
                .push(account);
        }

        let results: Vec<Vec<AccountSyncResult>> = stream::iter(groups)
            .map(|(connection_id, accounts)| {
                self.sync_group(ctx, connection_id, accounts, force_full_resync, cancel)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut summary = BatchSyncSummary::default();
        summary.extend(results.into_iter().flatten());
        self.progress_reporter.report_sync_complete(&summary);
        summary
    }

    /// Scheduled sync of every user with an active connection.
    pub async fn sync_all_users(&self, cancel: &CancellationToken) -> Result<BatchSyncSummary> {
        let user_ids = self.connection_repository.list_user_ids()?;
        info!("Scheduled sync for {} user(s)", user_ids.len());

        let mut summary = BatchSyncSummary::default();
        for user_id in user_ids {
            if cancel.is_cancelled() {
                break;
            }
            let ctx = UserContext::new(user_id);
            match self.sync_user(&ctx, false, cancel).await {
                Ok(user_summary) => summary.extend(user_summary.results),
                Err(e) => warn!("Scheduled sync for user {} failed: {}", ctx.user_id(), e),
            }
        }
        Ok(summary)
    }

    async fn sync_group(
        &self,
        ctx: &UserContext,
        connection_id: String,
        accounts: Vec<Account>,
        force_full_resync: bool,
        cancel: &CancellationToken,
    ) -> Vec<AccountSyncResult> {
        let mut results = Vec::with_capacity(accounts.len());
        for account in accounts {
            let result = if cancel.is_cancelled() {
                AccountSyncResult::skipped(&account.id, "sync cancelled")
            } else {
                self.progress_reporter.report_progress(SyncProgressPayload::new(
                    &account.id,
                    &connection_id,
                    SyncStatus::Syncing,
                ));
                self.sync_account(ctx, &account.id, force_full_resync).await
            };
            self.progress_reporter
                .report_progress(SyncProgressPayload::finished(&connection_id, &result));
            results.push(result);
        }
        results
    }
}
