use diesel::dsl::count;
use diesel::prelude::*;
use std::sync::Arc;

use finlink_core::errors::Result;
use finlink_core::transactions::{Transaction, TransactionRepositoryTrait};

use super::model::TransactionDB;
use crate::db::{get_connection, DbPool};
use crate::errors::IntoCore;
use crate::schema::transactions;

/// Read side of the transaction table. Writes go through the sync store.
pub struct TransactionRepository {
    pool: Arc<DbPool>,
}

impl TransactionRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl TransactionRepositoryTrait for TransactionRepository {
    fn list_for_account(&self, account_id: &str, limit: Option<i64>) -> Result<Vec<Transaction>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = transactions::table
            .filter(transactions::account_id.eq(account_id))
            .order((transactions::date.desc(), transactions::id.desc()))
            .select(TransactionDB::as_select())
            .into_boxed();
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        let rows = query.load::<TransactionDB>(&mut conn).into_core()?;
        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    fn count_for_account(&self, account_id: &str) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        transactions::table
            .filter(transactions::account_id.eq(account_id))
            .select(count(transactions::id))
            .first::<i64>(&mut conn)
            .into_core()
    }
}
