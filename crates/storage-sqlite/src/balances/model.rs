//! Database model for balance snapshots.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use finlink_core::balances::{Balance, NewBalance};

#[derive(Queryable, Identifiable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::balances)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BalanceDB {
    pub id: String,
    pub account_id: String,
    pub current_balance: Option<String>,
    pub available_balance: Option<String>,
    pub credit_limit: Option<String>,
    pub currency: Option<String>,
    pub as_of: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

fn parse_amount(value: Option<String>) -> Option<Decimal> {
    value.and_then(|v| Decimal::from_str(&v).ok())
}

impl From<BalanceDB> for Balance {
    fn from(db: BalanceDB) -> Self {
        Self {
            id: db.id,
            account_id: db.account_id,
            current: parse_amount(db.current_balance),
            available: parse_amount(db.available_balance),
            limit: parse_amount(db.credit_limit),
            currency: db.currency,
            as_of: db.as_of,
            created_at: db.created_at,
        }
    }
}

impl From<NewBalance> for BalanceDB {
    fn from(domain: NewBalance) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            account_id: domain.account_id,
            current_balance: domain.current.map(|d| d.to_string()),
            available_balance: domain.available.map(|d| d.to_string()),
            credit_limit: domain.limit.map(|d| d.to_string()),
            currency: domain.currency,
            as_of: domain.as_of,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}
