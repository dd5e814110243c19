use async_trait::async_trait;
use diesel::prelude::*;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use finlink_core::errors::{Error, Result};
use finlink_core::sync::{
    DownloadLog, NewDownloadLog, SyncCommit, SyncCommitResult, SyncError, SyncStoreTrait,
};
use finlink_core::transactions::TransactionUpsert;

use super::model::DownloadLogDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, OrNotFound};
use crate::schema::{accounts, download_logs, transactions};
use crate::transactions::TransactionDB;
use crate::utils::chunk_for_sqlite;

/// Atomic sync commits and the download log.
pub struct SyncRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SyncRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

/// Last write per remote id wins; first-seen order is kept.
fn dedupe(upserts: Vec<TransactionUpsert>) -> Vec<TransactionUpsert> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<TransactionUpsert> = Vec::with_capacity(upserts.len());
    for upsert in upserts {
        match position.get(&upsert.remote_transaction_id) {
            Some(&i) => unique[i] = upsert,
            None => {
                position.insert(upsert.remote_transaction_id.clone(), unique.len());
                unique.push(upsert);
            }
        }
    }
    unique
}

fn commit_in_transaction(
    conn: &mut SqliteConnection,
    commit: SyncCommit,
) -> Result<SyncCommitResult> {
    let SyncCommit {
        account_id,
        upserts,
        removed,
        next_cursor,
        mut log,
    } = commit;

    let archived = accounts::table
        .find(&account_id)
        .select(accounts::is_archived)
        .first::<bool>(conn)
        .or_not_found("Account", &account_id)?;
    if archived {
        return Err(Error::Sync(SyncError::Ineligible(format!(
            "account {} was archived during the download",
            account_id
        ))));
    }

    let upserts = dedupe(upserts);
    let incoming: Vec<String> = upserts
        .iter()
        .map(|u| u.remote_transaction_id.clone())
        .collect();

    let mut existing: HashSet<String> = HashSet::new();
    for chunk in chunk_for_sqlite(&incoming) {
        existing.extend(
            transactions::table
                .filter(transactions::account_id.eq(&account_id))
                .filter(transactions::remote_transaction_id.eq_any(chunk))
                .select(transactions::remote_transaction_id)
                .load::<String>(conn)
                .into_core()?,
        );
    }

    let now = chrono::Utc::now().naive_utc();
    let mut result = SyncCommitResult::default();
    let mut inserts: Vec<TransactionDB> = Vec::new();

    for upsert in upserts {
        if existing.contains(&upsert.remote_transaction_id) {
            diesel::update(
                transactions::table
                    .filter(transactions::account_id.eq(&account_id))
                    .filter(transactions::remote_transaction_id.eq(&upsert.remote_transaction_id)),
            )
            .set((
                transactions::date.eq(upsert.date),
                transactions::amount.eq(upsert.amount.to_string()),
                transactions::currency.eq(upsert.currency),
                transactions::name.eq(upsert.name),
                transactions::merchant_name.eq(upsert.merchant_name),
                transactions::pending.eq(upsert.pending),
                transactions::category.eq(upsert.category),
                transactions::updated_at.eq(now),
            ))
            .execute(conn)
            .into_core()?;
            result.updated += 1;
        } else {
            inserts.push(TransactionDB::from_upsert(&account_id, upsert, now));
        }
    }

    for chunk in inserts.chunks(100) {
        result.inserted += diesel::insert_into(transactions::table)
            .values(chunk)
            .execute(conn)
            .into_core()?;
    }

    for chunk in chunk_for_sqlite(&removed) {
        result.removed += diesel::delete(
            transactions::table
                .filter(transactions::account_id.eq(&account_id))
                .filter(transactions::remote_transaction_id.eq_any(chunk)),
        )
        .execute(conn)
        .into_core()?;
    }

    diesel::update(accounts::table.find(&account_id))
        .set((
            accounts::sync_cursor.eq(Some(next_cursor)),
            accounts::last_synced_at.eq(Some(now)),
            accounts::updated_at.eq(now),
        ))
        .execute(conn)
        .into_core()?;

    // Removal events cover the whole item; only rows of this account count.
    log.removed = i32::try_from(result.removed).unwrap_or(i32::MAX);
    diesel::insert_into(download_logs::table)
        .values(DownloadLogDB::from(log))
        .execute(conn)
        .into_core()?;

    debug!(
        "Committed sync for account {}: {} inserted, {} updated, {} removed",
        account_id, result.inserted, result.updated, result.removed
    );
    Ok(result)
}

#[async_trait]
impl SyncStoreTrait for SyncRepository {
    async fn commit_sync(&self, commit: SyncCommit) -> Result<SyncCommitResult> {
        self.writer
            .exec(move |conn| commit_in_transaction(conn, commit))
            .await
    }

    async fn record_failure(&self, log: NewDownloadLog) -> Result<()> {
        self.writer
            .exec(move |conn| {
                diesel::insert_into(download_logs::table)
                    .values(DownloadLogDB::from(log))
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }

    fn recent_logs(&self, account_id: &str, limit: i64) -> Result<Vec<DownloadLog>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = download_logs::table
            .filter(download_logs::account_id.eq(account_id))
            .order((download_logs::started_at.desc(), download_logs::id.desc()))
            .limit(limit)
            .select(DownloadLogDB::as_select())
            .load::<DownloadLogDB>(&mut conn)
            .into_core()?;
        Ok(rows.into_iter().map(DownloadLog::from).collect())
    }
}
