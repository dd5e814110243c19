use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::dsl::{count, max};
use diesel::prelude::*;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use finlink_core::accounts::{
    Account, AccountActivity, AccountDetailsUpdate, AccountRepositoryTrait, NewAccount,
};
use finlink_core::duplicates::{AccountMergeStoreTrait, MergeResult};
use finlink_core::errors::{Error, Result};
use finlink_core::reconciliation::{
    AccountRepoint, AppliedReconciliation, ReconciliationPlan, ReconciliationStoreTrait,
};

use super::model::AccountDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, OrNotFound};
use crate::schema::{accounts, balances, institution_connections, transactions};
use crate::utils::chunk_for_sqlite;

/// Repository for managing account data in the database
pub struct AccountRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl AccountRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn load(conn: &mut SqliteConnection, account_id: &str) -> Result<AccountDB> {
    accounts::table
        .find(account_id)
        .select(AccountDB::as_select())
        .first::<AccountDB>(conn)
        .or_not_found("Account", account_id)
}

fn insert_account(conn: &mut SqliteConnection, new_account: NewAccount) -> Result<AccountDB> {
    new_account.validate()?;
    let row: AccountDB = new_account.into();
    diesel::insert_into(accounts::table)
        .values(&row)
        .execute(conn)
        .into_core()?;
    Ok(row)
}

fn write_details(
    conn: &mut SqliteConnection,
    account_id: &str,
    details: AccountDetailsUpdate,
) -> Result<usize> {
    diesel::update(accounts::table.find(account_id))
        .set((
            accounts::name.eq(details.name),
            accounts::official_name.eq(details.official_name),
            accounts::account_type.eq(details.account_type),
            accounts::subtype.eq(details.subtype),
            accounts::mask.eq(details.mask),
            accounts::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(conn)
        .into_core()
}

/// Another non-archived account holding `remote_account_id`, other than `account_id`.
fn active_owner(
    conn: &mut SqliteConnection,
    remote_account_id: &str,
    account_id: &str,
) -> Result<Option<String>> {
    accounts::table
        .filter(accounts::remote_account_id.eq(remote_account_id))
        .filter(accounts::is_archived.eq(false))
        .filter(accounts::id.ne(account_id))
        .select(accounts::id)
        .first::<String>(conn)
        .optional()
        .into_core()
}

fn apply_repoint(conn: &mut SqliteConnection, repoint: AccountRepoint) -> Result<usize> {
    let current = load(conn, &repoint.account_id)?;
    if current.is_archived {
        return Err(Error::Conflict(format!(
            "Account {} was archived before reconciliation",
            repoint.account_id
        )));
    }
    if let Some(owner) = active_owner(conn, &repoint.remote_account_id, &repoint.account_id)? {
        return Err(Error::Conflict(format!(
            "Remote account {} is already held by account {}",
            repoint.remote_account_id, owner
        )));
    }

    // A cursor belongs to the credential that issued it.
    let moves_connection = current.connection_id != repoint.connection_id;
    let sync_cursor = if moves_connection {
        None
    } else {
        current.sync_cursor
    };

    diesel::update(accounts::table.find(&repoint.account_id))
        .set((
            accounts::remote_account_id.eq(&repoint.remote_account_id),
            accounts::connection_id.eq(&repoint.connection_id),
            accounts::sync_cursor.eq(sync_cursor),
        ))
        .execute(conn)
        .into_core()?;
    write_details(conn, &repoint.account_id, repoint.details)
}

fn merge_in_transaction(
    conn: &mut SqliteConnection,
    survivor_id: &str,
    loser_ids: &[String],
) -> Result<MergeResult> {
    let survivor = load(conn, survivor_id)?;
    if survivor.is_archived {
        return Err(Error::Conflict(format!(
            "Merge survivor {} is archived",
            survivor_id
        )));
    }

    let losers: Vec<String> = accounts::table
        .filter(accounts::id.eq_any(loser_ids))
        .filter(accounts::id.ne(survivor_id))
        .filter(accounts::is_archived.eq(false))
        .order(accounts::id.asc())
        .select(accounts::id)
        .load::<String>(conn)
        .into_core()?;
    if losers.is_empty() {
        return Ok(MergeResult::noop(Some(survivor.id)));
    }

    let mut held: HashSet<String> = transactions::table
        .filter(transactions::account_id.eq(survivor_id))
        .select(transactions::remote_transaction_id)
        .load::<String>(conn)
        .into_core()?
        .into_iter()
        .collect();

    let mut result = MergeResult::noop(Some(survivor.id.clone()));
    let now = chrono::Utc::now().naive_utc();

    for loser_id in &losers {
        let rows: Vec<(String, String)> = transactions::table
            .filter(transactions::account_id.eq(loser_id))
            .order((transactions::created_at.asc(), transactions::id.asc()))
            .select((transactions::id, transactions::remote_transaction_id))
            .load::<(String, String)>(conn)
            .into_core()?;

        let mut movable: Vec<String> = Vec::with_capacity(rows.len());
        for (id, remote_id) in rows {
            if held.insert(remote_id) {
                movable.push(id);
            } else {
                result.transactions_skipped += 1;
            }
        }

        for chunk in chunk_for_sqlite(&movable) {
            result.transactions_moved += diesel::update(
                transactions::table.filter(transactions::id.eq_any(chunk)),
            )
            .set((
                transactions::account_id.eq(survivor_id),
                transactions::updated_at.eq(now),
            ))
            .execute(conn)
            .into_core()?;
        }

        result.balances_moved +=
            diesel::update(balances::table.filter(balances::account_id.eq(loser_id)))
                .set(balances::account_id.eq(survivor_id))
                .execute(conn)
                .into_core()?;

        diesel::update(accounts::table.find(loser_id))
            .set((accounts::is_archived.eq(true), accounts::updated_at.eq(now)))
            .execute(conn)
            .into_core()?;
        result.archived_account_ids.push(loser_id.clone());
    }

    if result.transactions_skipped > 0 {
        debug!(
            "Merge into {} left {} overlapping transaction(s) on archived accounts",
            survivor_id, result.transactions_skipped
        );
    }
    Ok(result)
}

#[async_trait]
impl AccountRepositoryTrait for AccountRepository {
    async fn create(&self, new_account: NewAccount) -> Result<Account> {
        new_account.validate()?;

        self.writer
            .exec(move |conn| Ok(insert_account(conn, new_account)?.into()))
            .await
    }

    async fn update_details(
        &self,
        account_id: &str,
        details: AccountDetailsUpdate,
    ) -> Result<Account> {
        let account_id = account_id.to_string();
        self.writer
            .exec(move |conn| {
                if write_details(conn, &account_id, details)? == 0 {
                    return Err(Error::not_found("Account", account_id));
                }
                Ok(load(conn, &account_id)?.into())
            })
            .await
    }

    async fn set_hidden(&self, account_id: &str, hidden: bool) -> Result<Account> {
        let account_id = account_id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::update(accounts::table.find(&account_id))
                    .set((
                        accounts::is_hidden.eq(hidden),
                        accounts::updated_at.eq(chrono::Utc::now().naive_utc()),
                    ))
                    .execute(conn)
                    .into_core()?;
                Ok(load(conn, &account_id)?.into())
            })
            .await
    }

    fn get_by_id(&self, account_id: &str) -> Result<Account> {
        let mut conn = get_connection(&self.pool)?;
        Ok(load(&mut conn, account_id)?.into())
    }

    fn get_by_ids(&self, account_ids: &[String]) -> Result<Vec<Account>> {
        let mut conn = get_connection(&self.pool)?;
        let mut found = Vec::with_capacity(account_ids.len());
        for chunk in chunk_for_sqlite(account_ids) {
            let rows = accounts::table
                .filter(accounts::id.eq_any(chunk))
                .select(AccountDB::as_select())
                .load::<AccountDB>(&mut conn)
                .into_core()?;
            found.extend(rows.into_iter().map(Account::from));
        }
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    fn get_active_by_remote_id(&self, remote_account_id: &str) -> Result<Option<Account>> {
        let mut conn = get_connection(&self.pool)?;
        let row = accounts::table
            .filter(accounts::remote_account_id.eq(remote_account_id))
            .filter(accounts::is_archived.eq(false))
            .select(AccountDB::as_select())
            .first::<AccountDB>(&mut conn)
            .optional()
            .into_core()?;
        Ok(row.map(Account::from))
    }

    fn find_active_by_remote_ids(&self, remote_account_ids: &[String]) -> Result<Vec<Account>> {
        let mut conn = get_connection(&self.pool)?;
        let mut found = Vec::new();
        for chunk in chunk_for_sqlite(remote_account_ids) {
            let rows = accounts::table
                .filter(accounts::remote_account_id.eq_any(chunk))
                .filter(accounts::is_archived.eq(false))
                .select(AccountDB::as_select())
                .load::<AccountDB>(&mut conn)
                .into_core()?;
            found.extend(rows.into_iter().map(Account::from));
        }
        Ok(found)
    }

    fn list_for_connection(&self, connection_id: &str) -> Result<Vec<Account>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = accounts::table
            .filter(accounts::connection_id.eq(connection_id))
            .order((accounts::created_at.asc(), accounts::id.asc()))
            .select(AccountDB::as_select())
            .load::<AccountDB>(&mut conn)
            .into_core()?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    fn list_for_institution(
        &self,
        user_id: &str,
        institution_id: &str,
        include_archived: bool,
    ) -> Result<Vec<Account>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = accounts::table
            .inner_join(institution_connections::table)
            .filter(institution_connections::user_id.eq(user_id))
            .filter(institution_connections::institution_id.eq(institution_id))
            .into_boxed();
        if !include_archived {
            query = query.filter(accounts::is_archived.eq(false));
        }
        let rows = query
            .order((accounts::created_at.asc(), accounts::id.asc()))
            .select(AccountDB::as_select())
            .load::<AccountDB>(&mut conn)
            .into_core()?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    fn list_for_user(&self, user_id: &str, include_archived: bool) -> Result<Vec<Account>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = accounts::table
            .inner_join(institution_connections::table)
            .filter(institution_connections::user_id.eq(user_id))
            .into_boxed();
        if !include_archived {
            query = query.filter(accounts::is_archived.eq(false));
        }
        let rows = query
            .order((accounts::created_at.asc(), accounts::id.asc()))
            .select(AccountDB::as_select())
            .load::<AccountDB>(&mut conn)
            .into_core()?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    fn activity(&self, account_ids: &[String]) -> Result<HashMap<String, AccountActivity>> {
        let mut conn = get_connection(&self.pool)?;
        let mut activity: HashMap<String, AccountActivity> = account_ids
            .iter()
            .map(|id| (id.clone(), AccountActivity::default()))
            .collect();

        for chunk in chunk_for_sqlite(account_ids) {
            let tx_rows = transactions::table
                .filter(transactions::account_id.eq_any(chunk))
                .group_by(transactions::account_id)
                .select((
                    transactions::account_id,
                    max(transactions::date),
                    count(transactions::id),
                ))
                .load::<(String, Option<NaiveDate>, i64)>(&mut conn)
                .into_core()?;
            for (account_id, latest, total) in tx_rows {
                let entry = activity.entry(account_id).or_default();
                entry.latest_transaction_date = latest;
                entry.transaction_count = total;
            }

            let balance_rows = balances::table
                .filter(balances::account_id.eq_any(chunk))
                .group_by(balances::account_id)
                .select((balances::account_id, count(balances::id)))
                .load::<(String, i64)>(&mut conn)
                .into_core()?;
            for (account_id, total) in balance_rows {
                activity.entry(account_id).or_default().balance_count = total;
            }
        }

        Ok(activity)
    }
}

#[async_trait]
impl AccountMergeStoreTrait for AccountRepository {
    async fn merge_accounts(
        &self,
        survivor_id: &str,
        loser_ids: Vec<String>,
    ) -> Result<MergeResult> {
        let survivor_id = survivor_id.to_string();
        self.writer
            .exec(move |conn| merge_in_transaction(conn, &survivor_id, &loser_ids))
            .await
    }
}

#[async_trait]
impl ReconciliationStoreTrait for AccountRepository {
    async fn apply_reconciliation(
        &self,
        plan: ReconciliationPlan,
    ) -> Result<AppliedReconciliation> {
        self.writer
            .exec(move |conn| {
                let mut applied = AppliedReconciliation::default();
                let now = chrono::Utc::now().naive_utc();

                // Orphans first so their remote ids are free for repoints and creations.
                for chunk in chunk_for_sqlite(&plan.orphans) {
                    applied.orphaned += diesel::update(
                        accounts::table
                            .filter(accounts::id.eq_any(chunk))
                            .filter(accounts::is_archived.eq(false)),
                    )
                    .set((accounts::is_archived.eq(true), accounts::updated_at.eq(now)))
                    .execute(conn)
                    .into_core()?;
                }

                for repoint in plan.updates {
                    applied.updated += apply_repoint(conn, repoint)?;
                }

                for creation in plan.creations {
                    if let Some(owner) =
                        active_owner(conn, &creation.remote_account_id, "")?
                    {
                        warn!(
                            "Remote account {} appeared under account {} during reconciliation",
                            creation.remote_account_id, owner
                        );
                        return Err(Error::Conflict(format!(
                            "Remote account {} is already held by account {}",
                            creation.remote_account_id, owner
                        )));
                    }
                    let row = insert_account(conn, creation)?;
                    applied.created_account_ids.push(row.id);
                }

                Ok(applied)
            })
            .await
    }
}
