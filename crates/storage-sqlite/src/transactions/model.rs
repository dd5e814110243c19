//! Database model for transactions.

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use finlink_core::transactions::{Transaction, TransactionUpsert};

#[derive(Queryable, Identifiable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::transactions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TransactionDB {
    pub id: String,
    pub account_id: String,
    pub remote_transaction_id: String,
    pub date: NaiveDate,
    pub amount: String,
    pub currency: Option<String>,
    pub name: String,
    pub merchant_name: Option<String>,
    pub pending: bool,
    pub category: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TransactionDB {
    pub fn from_upsert(account_id: &str, upsert: TransactionUpsert, now: NaiveDateTime) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            account_id: account_id.to_string(),
            remote_transaction_id: upsert.remote_transaction_id,
            date: upsert.date,
            amount: upsert.amount.to_string(),
            currency: upsert.currency,
            name: upsert.name,
            merchant_name: upsert.merchant_name,
            pending: upsert.pending,
            category: upsert.category,
            created_at: now,
            updated_at: now,
        }
    }
}

impl From<TransactionDB> for Transaction {
    fn from(db: TransactionDB) -> Self {
        Self {
            amount: Decimal::from_str(&db.amount).unwrap_or_default(),
            id: db.id,
            account_id: db.account_id,
            remote_transaction_id: db.remote_transaction_id,
            date: db.date,
            currency: db.currency,
            name: db.name,
            merchant_name: db.merchant_name,
            pending: db.pending,
            category: db.category,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
