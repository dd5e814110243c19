//! Duplicate grouping and survivor selection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::accounts::{Account, AccountActivity};

/// Grouping key of the same physical account across links.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum DuplicateKey {
    Masked {
        account_type: String,
        subtype: Option<String>,
        name: String,
        mask: String,
    },
    /// No mask on the account; weaker evidence, never auto-merged.
    NameOnly {
        account_type: String,
        subtype: Option<String>,
        name: String,
    },
}

impl DuplicateKey {
    pub fn for_account(account: &Account) -> Self {
        let identity = account.identity();
        match identity.mask {
            Some(mask) => DuplicateKey::Masked {
                account_type: identity.account_type,
                subtype: identity.subtype,
                name: identity.name,
                mask,
            },
            None => DuplicateKey::NameOnly {
                account_type: identity.account_type,
                subtype: identity.subtype,
                name: identity.name,
            },
        }
    }

    pub fn is_masked(&self) -> bool {
        matches!(self, DuplicateKey::Masked { .. })
    }
}

/// Active accounts of one institution believed to be one physical account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub institution_id: String,
    pub key: DuplicateKey,
    /// Members ordered by creation time, then id.
    pub accounts: Vec<Account>,
}

impl DuplicateGroup {
    /// Only groups whose members share the identifying mask merge without an operator.
    pub fn should_merge(&self) -> bool {
        self.key.is_masked() && self.accounts.len() > 1
    }

    pub fn account_ids(&self) -> Vec<String> {
        self.accounts.iter().map(|a| a.id.clone()).collect()
    }
}

/// Groups the non-archived `accounts` of one institution by duplicate key.
///
/// Only keys with more than one member are returned, in key order.
pub fn group_duplicates(institution_id: &str, accounts: &[Account]) -> Vec<DuplicateGroup> {
    let mut by_key: BTreeMap<DuplicateKey, Vec<Account>> = BTreeMap::new();
    for account in accounts.iter().filter(|a| !a.is_archived) {
        by_key
            .entry(DuplicateKey::for_account(account))
            .or_default()
            .push(account.clone());
    }

    by_key
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(key, mut members)| {
            members.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
            DuplicateGroup {
                institution_id: institution_id.to_string(),
                key,
                accounts: members,
            }
        })
        .collect()
}

/// Picks the member that keeps the history.
///
/// Ranking: on a usable connection, then most recent transaction date, then
/// earliest creation, then smallest id.
pub fn choose_survivor<'a>(
    members: &'a [Account],
    usable_connection_ids: &HashSet<String>,
    activity: &HashMap<String, AccountActivity>,
) -> Option<&'a Account> {
    members.iter().max_by_key(|account| {
        let latest: Option<NaiveDate> = activity
            .get(&account.id)
            .and_then(|a| a.latest_transaction_date);
        (
            usable_connection_ids.contains(&account.connection_id),
            latest,
            Reverse(account.created_at),
            Reverse(account.id.clone()),
        )
    })
}

/// What a merge moved and archived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub survivor_id: Option<String>,
    pub archived_account_ids: Vec<String>,
    pub transactions_moved: usize,
    /// Loser transactions left behind because the survivor already had the remote id.
    pub transactions_skipped: usize,
    pub balances_moved: usize,
}

impl MergeResult {
    pub fn noop(survivor_id: Option<String>) -> Self {
        Self {
            survivor_id,
            ..Default::default()
        }
    }

    pub fn rows_affected(&self) -> usize {
        self.transactions_moved + self.balances_moved + self.archived_account_ids.len()
    }

    pub fn is_noop(&self) -> bool {
        self.rows_affected() == 0
    }
}

/// Result of the gated merge over every group of an institution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoMergeSummary {
    pub institution_id: String,
    pub merged: Vec<MergeResult>,
    /// Groups that need an operator decision.
    pub surfaced: Vec<DuplicateGroup>,
}
