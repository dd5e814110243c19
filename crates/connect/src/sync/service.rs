//! Cursor-based transaction download for one account.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use finlink_core::accounts::{Account, AccountRepositoryTrait};
use finlink_core::connections::{ConnectionRepositoryTrait, InstitutionConnection};
use finlink_core::errors::{Error, Result};
use finlink_core::providers::{
    ErrorClass, ProviderErrorKind, RemoteTransaction, TransactionsSyncPage,
    TransactionsSyncRequest,
};
use finlink_core::sync::{
    is_stalled, DownloadLog, DownloadOutcome, NewDownloadLog, SyncCommit, SyncError, SyncMode,
    SyncOutcome, SyncRunStatus, SyncStoreTrait,
};
use finlink_core::transactions::TransactionUpsert;
use finlink_core::UserContext;

use super::models::SyncConfig;
use crate::aggregator::{flag_if_credential_invalid, AggregatorClient};

#[async_trait]
pub trait TransactionSyncServiceTrait: Send + Sync {
    /// Downloads new transactions for one account.
    ///
    /// Credential failures flag the connection and come back as a
    /// `ReauthRequired` outcome. Every other failure is returned as an error
    /// after the failure log row is written.
    async fn sync(
        &self,
        ctx: &UserContext,
        account_id: &str,
        force_full_resync: bool,
    ) -> Result<SyncOutcome>;

    /// Most recent download logs of one of the user's accounts, newest first.
    fn recent_logs(&self, ctx: &UserContext, account_id: &str, limit: i64)
        -> Result<Vec<DownloadLog>>;
}

/// Add/modify/remove events of every page, keyed by remote transaction id.
///
/// A later page overrides an earlier one for the same id.
#[derive(Debug, Default)]
struct PageBuffer {
    order: Vec<String>,
    entries: HashMap<String, Option<RemoteTransaction>>,
    added: usize,
    modified: usize,
}

impl PageBuffer {
    fn record(&mut self, id: String, entry: Option<RemoteTransaction>) {
        if !self.entries.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.entries.insert(id, entry);
    }

    fn absorb(&mut self, remote_account_id: &str, page: TransactionsSyncPage) {
        for txn in page.added {
            if txn.remote_account_id == remote_account_id {
                self.added += 1;
                self.record(txn.remote_transaction_id.clone(), Some(txn));
            }
        }
        for txn in page.modified {
            if txn.remote_account_id == remote_account_id {
                self.modified += 1;
                self.record(txn.remote_transaction_id.clone(), Some(txn));
            }
        }
        for id in page.removed {
            self.record(id, None);
        }
    }

    fn downloaded(&self) -> usize {
        self.added + self.modified
    }

    /// Upserts with the account's sign convention applied, and removed ids.
    fn into_changes(mut self, account_type: &str) -> (Vec<TransactionUpsert>, Vec<String>) {
        let mut upserts = Vec::new();
        let mut removed = Vec::new();
        for id in self.order {
            match self.entries.remove(&id).flatten() {
                Some(txn) => upserts.push(TransactionUpsert::from_remote(account_type, txn)),
                None => removed.push(id),
            }
        }
        (upserts, removed)
    }
}

struct Download {
    buffer: PageBuffer,
    next_cursor: String,
    pages: usize,
}

struct DownloadFailure {
    error: Error,
    pages: usize,
}

pub struct TransactionSyncService {
    account_repository: Arc<dyn AccountRepositoryTrait>,
    connection_repository: Arc<dyn ConnectionRepositoryTrait>,
    sync_store: Arc<dyn SyncStoreTrait>,
    client: Arc<dyn AggregatorClient>,
    config: SyncConfig,
}

impl TransactionSyncService {
    pub fn new(
        account_repository: Arc<dyn AccountRepositoryTrait>,
        connection_repository: Arc<dyn ConnectionRepositoryTrait>,
        sync_store: Arc<dyn SyncStoreTrait>,
        client: Arc<dyn AggregatorClient>,
        config: SyncConfig,
    ) -> Self {
        Self {
            account_repository,
            connection_repository,
            sync_store,
            client,
            config,
        }
    }

    /// The account and its connection, if `ctx` owns them.
    fn load_owned(
        &self,
        ctx: &UserContext,
        account_id: &str,
    ) -> Result<(Account, InstitutionConnection)> {
        let account = self.account_repository.get_by_id(account_id)?;
        let connection = self
            .connection_repository
            .get_by_id(&account.connection_id)?;
        if !ctx.owns(&connection.user_id) {
            return Err(Error::not_found("Account", account_id));
        }
        Ok((account, connection))
    }

    /// Fetches pages until `has_more` is false, restarting on pagination mutations.
    async fn download(
        &self,
        connection: &InstitutionConnection,
        account: &Account,
        start_cursor: Option<String>,
    ) -> std::result::Result<Download, DownloadFailure> {
        let mut pages = 0usize;
        let mut restarts = 0u32;

        'attempt: loop {
            let mut buffer = PageBuffer::default();
            let mut cursor = start_cursor.clone();

            loop {
                if pages >= self.config.max_pages {
                    return Err(DownloadFailure {
                        error: SyncError::PageBudgetExceeded(self.config.max_pages).into(),
                        pages,
                    });
                }

                let request = TransactionsSyncRequest {
                    cursor: cursor.clone(),
                    count: self.config.page_size,
                    remote_account_id: Some(account.remote_account_id.clone()),
                };
                let page = match self.client.sync_transactions(connection, &request).await {
                    Ok(page) => page,
                    Err(err) if is_pagination_mutation(&err) => {
                        pages += 1;
                        if restarts >= self.config.max_pagination_restarts {
                            return Err(DownloadFailure {
                                error: SyncError::PaginationRestartsExhausted(restarts).into(),
                                pages,
                            });
                        }
                        restarts += 1;
                        warn!(
                            "Transactions changed during pagination for account {}; restarting ({}/{})",
                            account.id, restarts, self.config.max_pagination_restarts
                        );
                        continue 'attempt;
                    }
                    Err(error) => {
                        return Err(DownloadFailure {
                            error,
                            pages: pages + 1,
                        })
                    }
                };
                pages += 1;

                if page.has_more && cursor.as_deref() == Some(page.next_cursor.as_str()) {
                    return Err(DownloadFailure {
                        error: SyncError::CursorStuck.into(),
                        pages,
                    });
                }

                debug!(
                    "Page {} for account {}: {} added, {} modified, {} removed",
                    pages,
                    account.id,
                    page.added.len(),
                    page.modified.len(),
                    page.removed.len()
                );

                let has_more = page.has_more;
                let next_cursor = page.next_cursor.clone();
                buffer.absorb(&account.remote_account_id, page);

                if !has_more {
                    return Ok(Download {
                        buffer,
                        next_cursor,
                        pages,
                    });
                }
                cursor = Some(next_cursor);
            }
        }
    }

    /// Warns and returns true when the newest logs all made no progress.
    fn check_stall(&self, account_id: &str) -> bool {
        let threshold = self.config.stall_threshold;
        let logs = match self
            .sync_store
            .recent_logs(account_id, i64::try_from(threshold).unwrap_or(i64::MAX))
        {
            Ok(logs) => logs,
            Err(e) => {
                warn!("Could not read download logs for account {}: {}", account_id, e);
                return false;
            }
        };
        let stalled = is_stalled(&logs, threshold);
        if stalled {
            warn!(
                "Account {} made no progress in its last {} sync attempts",
                account_id, threshold
            );
        }
        stalled
    }

    async fn fail(
        &self,
        account: &Account,
        connection: &InstitutionConnection,
        mode: SyncMode,
        cursor_before: Option<String>,
        failure: DownloadFailure,
        started_at: DateTime<Utc>,
    ) -> Result<SyncOutcome> {
        let DownloadFailure { error: err, pages } = failure;
        let credential_invalid = err
            .as_provider()
            .map(|p| p.is_credential_invalid())
            .unwrap_or(false);
        let outcome = if credential_invalid {
            DownloadOutcome::ReauthRequired
        } else {
            DownloadOutcome::Failed
        };

        let log = NewDownloadLog::failure(
            &account.id,
            mode,
            outcome,
            cursor_before,
            i32::try_from(pages).unwrap_or(i32::MAX),
            err.to_string(),
            started_at,
        );
        if let Err(e) = self.sync_store.record_failure(log).await {
            warn!("Failed to write download log for account {}: {}", account.id, e);
        }

        if credential_invalid {
            flag_if_credential_invalid(self.connection_repository.as_ref(), connection, &err)
                .await;
            let mut outcome =
                SyncOutcome::reauth_required(&account.id, mode, pages, err.to_string());
            outcome.stalled = self.check_stall(&account.id);
            return Ok(outcome);
        }

        match err.as_provider().map(|p| p.class()) {
            Some(ErrorClass::TransientRemote) => warn!(
                "Transient failure syncing account {} (institution {}): {}",
                account.id, connection.institution_id, err
            ),
            _ => error!(
                "Sync failed for account {} (institution {}) at {}: {}",
                account.id,
                connection.institution_id,
                Utc::now().to_rfc3339(),
                err
            ),
        }
        self.check_stall(&account.id);
        Err(err)
    }
}

fn is_pagination_mutation(err: &Error) -> bool {
    err.as_provider()
        .map(|p| p.kind == ProviderErrorKind::MutationDuringPagination)
        .unwrap_or(false)
}

#[async_trait]
impl TransactionSyncServiceTrait for TransactionSyncService {
    async fn sync(
        &self,
        ctx: &UserContext,
        account_id: &str,
        force_full_resync: bool,
    ) -> Result<SyncOutcome> {
        let (account, connection) = self.load_owned(ctx, account_id)?;
        if account.is_archived {
            return Err(SyncError::Ineligible("account is archived".to_string()).into());
        }
        if let Some(reason) = connection.ineligibility_reason() {
            return Err(SyncError::Ineligible(reason.to_string()).into());
        }

        let cursor_before = account.sync_cursor.clone();
        let mode = if force_full_resync || cursor_before.is_none() {
            SyncMode::Full
        } else {
            SyncMode::Incremental
        };
        let start_cursor = match mode {
            SyncMode::Full => None,
            SyncMode::Incremental => cursor_before.clone(),
        };
        let started_at = Utc::now();
        debug!("Starting {} sync for account {}", mode, account.id);

        let download = match self.download(&connection, &account, start_cursor).await {
            Ok(download) => download,
            Err(failure) => {
                return self
                    .fail(&account, &connection, mode, cursor_before, failure, started_at)
                    .await
            }
        };

        let Download {
            buffer,
            next_cursor,
            pages,
        } = download;
        let downloaded = buffer.downloaded();
        let mut log = NewDownloadLog::success(
            &account.id,
            mode,
            cursor_before.clone(),
            next_cursor.clone(),
            started_at,
        );
        log.added = i32::try_from(buffer.added).unwrap_or(i32::MAX);
        log.modified = i32::try_from(buffer.modified).unwrap_or(i32::MAX);
        log.downloaded = i32::try_from(downloaded).unwrap_or(i32::MAX);
        log.pages = i32::try_from(pages).unwrap_or(i32::MAX);

        let (upserts, removed) = buffer.into_changes(&account.account_type);
        let commit = SyncCommit {
            account_id: account.id.clone(),
            upserts,
            removed,
            next_cursor: next_cursor.clone(),
            log,
        };
        let written = match self.sync_store.commit_sync(commit).await {
            Ok(written) => written,
            Err(error) => {
                let failure = DownloadFailure { error, pages };
                return self
                    .fail(&account, &connection, mode, cursor_before, failure, started_at)
                    .await;
            }
        };

        let cursor_advanced =
            !next_cursor.is_empty() && cursor_before.as_deref() != Some(next_cursor.as_str());
        info!(
            "Synced account {} ({}): {} downloaded, {} inserted, {} updated, {} removed over {} page(s)",
            account.id,
            mode,
            downloaded,
            written.inserted,
            written.updated,
            written.removed,
            pages
        );

        Ok(SyncOutcome {
            account_id: account.id.clone(),
            mode,
            status: SyncRunStatus::Completed,
            downloaded,
            inserted: written.inserted,
            updated: written.updated,
            removed: written.removed,
            pages,
            cursor_advanced,
            stalled: self.check_stall(&account.id),
            error: None,
        })
    }

    fn recent_logs(
        &self,
        ctx: &UserContext,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<DownloadLog>> {
        self.load_owned(ctx, account_id)?;
        self.sync_store.recent_logs(account_id, limit)
    }
}
