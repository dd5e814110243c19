//! Balance snapshot models and the monthly collapse rule.

use chrono::{Datelike, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::providers::RemoteBalances;

/// Immutable point-in-time balance of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub id: String,
    pub account_id: String,
    pub current: Option<Decimal>,
    pub available: Option<Decimal>,
    pub limit: Option<Decimal>,
    pub currency: Option<String>,
    pub as_of: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBalance {
    pub account_id: String,
    pub current: Option<Decimal>,
    pub available: Option<Decimal>,
    pub limit: Option<Decimal>,
    pub currency: Option<String>,
    pub as_of: NaiveDateTime,
}

impl NewBalance {
    pub fn from_remote(account_id: &str, balances: &RemoteBalances, as_of: NaiveDateTime) -> Self {
        Self {
            account_id: account_id.to_string(),
            current: balances.current,
            available: balances.available,
            limit: balances.limit,
            currency: balances.currency.clone(),
            as_of,
        }
    }
}

/// Ids of snapshots that lose the one-per-account-per-month collapse.
///
/// Within each (account, year, month) the snapshot with the latest `as_of`
/// survives; ties go to the latest `created_at`, then the largest id.
pub fn monthly_collapse_victims(balances: &[Balance]) -> Vec<String> {
    let mut keepers: HashMap<(&str, i32, u32), &Balance> = HashMap::new();
    for balance in balances {
        let key = (
            balance.account_id.as_str(),
            balance.as_of.year(),
            balance.as_of.month(),
        );
        keepers
            .entry(key)
            .and_modify(|kept| {
                let newer = (balance.as_of, balance.created_at, &balance.id)
                    > (kept.as_of, kept.created_at, &kept.id);
                if newer {
                    *kept = balance;
                }
            })
            .or_insert(balance);
    }

    let mut victims: Vec<String> = balances
        .iter()
        .filter(|b| {
            let key = (b.account_id.as_str(), b.as_of.year(), b.as_of.month());
            keepers.get(&key).map(|kept| kept.id != b.id).unwrap_or(false)
        })
        .map(|b| b.id.clone())
        .collect();
    victims.sort();
    victims
}
