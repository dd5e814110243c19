//! Matching of fresh remote accounts to local accounts after a relink.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use super::reconciliation_model::{AccountRepoint, ReconciliationConflict, ReconciliationPlan};
use crate::accounts::{Account, AccountDetailsUpdate, AccountIdentity, NewAccount};
use crate::providers::RemoteAccount;

/// Builds the reconciliation plan for one institution.
///
/// * `locals` - the institution's accounts across all of the user's connections
/// * `fresh` - the account list returned with `connection_id`'s credential
/// * `owners` - fresh remote id to the active account currently holding it,
///   looked up across every user
///
/// Fresh accounts are matched by identity first; among identity matches the
/// one already holding the same remote id wins, then the most recently synced,
/// then the earliest created, then the smallest id. A fresh account without an
/// identity match may still claim a local account holding its exact remote id.
pub fn plan_reconciliation(
    institution_id: &str,
    connection_id: &str,
    locals: &[Account],
    fresh: &[RemoteAccount],
    owners: &HashMap<String, String>,
) -> ReconciliationPlan {
    let mut locals: Vec<&Account> = locals.iter().filter(|a| !a.is_archived).collect();
    locals.sort_by(|a, b| a.id.cmp(&b.id));
    let mut fresh: Vec<&RemoteAccount> = fresh.iter().collect();
    fresh.sort_by(|a, b| a.remote_account_id.cmp(&b.remote_account_id));

    let mut plan = ReconciliationPlan {
        institution_id: institution_id.to_string(),
        connection_id: connection_id.to_string(),
        ..Default::default()
    };
    let mut claimed: HashSet<&str> = HashSet::new();
    let mut protected: HashSet<String> = HashSet::new();

    for remote in fresh {
        let identity = AccountIdentity::of_remote(remote);
        let candidate = locals
            .iter()
            .filter(|l| !claimed.contains(l.id.as_str()) && l.identity() == identity)
            .max_by_key(|l| {
                (
                    l.remote_account_id == remote.remote_account_id,
                    l.last_synced_at,
                    Reverse(l.created_at),
                    Reverse(l.id.clone()),
                )
            })
            .or_else(|| {
                locals.iter().find(|l| {
                    !claimed.contains(l.id.as_str())
                        && l.remote_account_id == remote.remote_account_id
                })
            })
            .copied();

        let Some(local) = candidate else {
            match owners.get(&remote.remote_account_id) {
                Some(owner) => {
                    protected.insert(owner.clone());
                    plan.conflicts.push(ReconciliationConflict {
                        remote_account_id: remote.remote_account_id.clone(),
                        account_id: None,
                        owner_account_id: owner.clone(),
                    });
                }
                None => plan
                    .creations
                    .push(NewAccount::from_remote(connection_id, remote)),
            }
            continue;
        };
        claimed.insert(local.id.as_str());

        let owner = owners
            .get(&remote.remote_account_id)
            .filter(|owner| **owner != local.id);
        if local.remote_account_id != remote.remote_account_id {
            if let Some(owner) = owner {
                protected.insert(local.id.clone());
                protected.insert(owner.clone());
                plan.conflicts.push(ReconciliationConflict {
                    remote_account_id: remote.remote_account_id.clone(),
                    account_id: Some(local.id.clone()),
                    owner_account_id: owner.clone(),
                });
                continue;
            }
        } else if local.connection_id == connection_id {
            plan.unchanged.push(local.id.clone());
            continue;
        }

        plan.updates.push(AccountRepoint {
            account_id: local.id.clone(),
            previous_remote_account_id: local.remote_account_id.clone(),
            remote_account_id: remote.remote_account_id.clone(),
            previous_connection_id: local.connection_id.clone(),
            connection_id: connection_id.to_string(),
            details: AccountDetailsUpdate::from(remote),
        });
    }

    plan.orphans = locals
        .iter()
        .filter(|l| !claimed.contains(l.id.as_str()) && !protected.contains(&l.id))
        .map(|l| l.id.clone())
        .collect();
    plan
}
