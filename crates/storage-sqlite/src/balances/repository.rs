use async_trait::async_trait;
use diesel::prelude::*;
use log::info;
use std::sync::Arc;

use finlink_core::balances::{monthly_collapse_victims, Balance, BalanceRepositoryTrait, NewBalance};
use finlink_core::errors::Result;

use super::model::BalanceDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::balances;
use crate::utils::chunk_for_sqlite;

pub struct BalanceRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl BalanceRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl BalanceRepositoryTrait for BalanceRepository {
    async fn insert_many(&self, new_balances: Vec<NewBalance>) -> Result<usize> {
        if new_balances.is_empty() {
            return Ok(0);
        }
        self.writer
            .exec(move |conn| {
                let rows: Vec<BalanceDB> = new_balances.into_iter().map(BalanceDB::from).collect();
                diesel::insert_into(balances::table)
                    .values(&rows)
                    .execute(conn)
                    .into_core()
            })
            .await
    }

    fn list_for_account(&self, account_id: &str) -> Result<Vec<Balance>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = balances::table
            .filter(balances::account_id.eq(account_id))
            .order((balances::as_of.desc(), balances::created_at.desc()))
            .select(BalanceDB::as_select())
            .load::<BalanceDB>(&mut conn)
            .into_core()?;
        Ok(rows.into_iter().map(Balance::from).collect())
    }

    /// Keeps the latest snapshot per account and calendar month.
    ///
    /// `None` collapses every account.
    async fn collapse_monthly(&self, account_ids: Option<Vec<String>>) -> Result<usize> {
        self.writer
            .exec(move |conn| {
                let rows: Vec<BalanceDB> = match &account_ids {
                    Some(ids) => {
                        let mut rows = Vec::new();
                        for chunk in chunk_for_sqlite(ids) {
                            rows.extend(
                                balances::table
                                    .filter(balances::account_id.eq_any(chunk))
                                    .select(BalanceDB::as_select())
                                    .load::<BalanceDB>(conn)
                                    .into_core()?,
                            );
                        }
                        rows
                    }
                    None => balances::table
                        .select(BalanceDB::as_select())
                        .load::<BalanceDB>(conn)
                        .into_core()?,
                };

                let snapshots: Vec<Balance> = rows.into_iter().map(Balance::from).collect();
                let victims = monthly_collapse_victims(&snapshots);

                let mut deleted = 0;
                for chunk in chunk_for_sqlite(&victims) {
                    deleted += diesel::delete(balances::table.filter(balances::id.eq_any(chunk)))
                        .execute(conn)
                        .into_core()?;
                }
                if deleted > 0 {
                    info!("Collapsed {} balance snapshot(s) to monthly", deleted);
                }
                Ok(deleted)
            })
            .await
    }
}
