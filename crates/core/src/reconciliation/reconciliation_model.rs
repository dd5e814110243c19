//! Reconciliation plan and result models.

use serde::{Deserialize, Serialize};

use crate::accounts::{AccountDetailsUpdate, NewAccount};

/// Rewrite of one local account onto the fresh remote identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRepoint {
    pub account_id: String,
    pub previous_remote_account_id: String,
    pub remote_account_id: String,
    pub previous_connection_id: String,
    pub connection_id: String,
    pub details: AccountDetailsUpdate,
}

impl AccountRepoint {
    pub fn changes_remote_id(&self) -> bool {
        self.previous_remote_account_id != self.remote_account_id
    }
}

/// A fresh remote id already held by a different active account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationConflict {
    pub remote_account_id: String,
    /// Local account that matched the fresh account by identity, if any.
    pub account_id: Option<String>,
    /// Active account currently holding `remote_account_id`.
    pub owner_account_id: String,
}

/// Everything one reconciliation will write, applied in one store transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationPlan {
    pub institution_id: String,
    /// Connection whose credential produced the fresh account list.
    pub connection_id: String,
    pub updates: Vec<AccountRepoint>,
    pub unchanged: Vec<String>,
    pub conflicts: Vec<ReconciliationConflict>,
    pub orphans: Vec<String>,
    pub creations: Vec<NewAccount>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.orphans.is_empty() && self.creations.is_empty()
    }
}

/// Rows actually written by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedReconciliation {
    pub updated: usize,
    pub orphaned: usize,
    pub created_account_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    pub institution_id: String,
    pub connection_id: String,
    pub updated: usize,
    pub conflicts: usize,
    pub orphaned: usize,
    pub created: usize,
    pub unchanged: usize,
    pub conflict_details: Vec<ReconciliationConflict>,
    pub orphaned_account_ids: Vec<String>,
    pub created_account_ids: Vec<String>,
}

impl ReconcileResult {
    pub fn from_applied(plan: &ReconciliationPlan, applied: AppliedReconciliation) -> Self {
        Self {
            institution_id: plan.institution_id.clone(),
            connection_id: plan.connection_id.clone(),
            updated: applied.updated,
            conflicts: plan.conflicts.len(),
            orphaned: applied.orphaned,
            created: applied.created_account_ids.len(),
            unchanged: plan.unchanged.len(),
            conflict_details: plan.conflicts.clone(),
            orphaned_account_ids: plan.orphans.clone(),
            created_account_ids: applied.created_account_ids,
        }
    }
}
