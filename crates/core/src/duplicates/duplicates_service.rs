use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::duplicates_model::{
    choose_survivor, group_duplicates, AutoMergeSummary, DuplicateGroup, DuplicateKey,
    MergeResult,
};
use super::duplicates_traits::{AccountMergeStoreTrait, DuplicateServiceTrait};
use crate::accounts::{Account, AccountRepositoryTrait};
use crate::connections::{ConnectionRepositoryTrait, InstitutionConnection};
use crate::context::UserContext;
use crate::errors::{Error, Result, ValidationError};
use crate::locks::{InstitutionGuard, InstitutionLocks};

/// Detects and merges accounts created by linking the same institution twice.
pub struct DuplicateService {
    account_repository: Arc<dyn AccountRepositoryTrait>,
    connection_repository: Arc<dyn ConnectionRepositoryTrait>,
    merge_store: Arc<dyn AccountMergeStoreTrait>,
    locks: Arc<InstitutionLocks>,
}

impl DuplicateService {
    pub fn new(
        account_repository: Arc<dyn AccountRepositoryTrait>,
        connection_repository: Arc<dyn ConnectionRepositoryTrait>,
        merge_store: Arc<dyn AccountMergeStoreTrait>,
        locks: Arc<InstitutionLocks>,
    ) -> Self {
        Self {
            account_repository,
            connection_repository,
            merge_store,
            locks,
        }
    }

    fn institution_connections(
        &self,
        ctx: &UserContext,
        institution_id: &str,
    ) -> Result<HashMap<String, InstitutionConnection>> {
        Ok(self
            .connection_repository
            .list_for_institution(ctx.user_id(), institution_id)?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect())
    }

    /// Merges `group` while the caller holds the institution's section.
    pub async fn merge_locked(
        &self,
        guard: &InstitutionGuard,
        ctx: &UserContext,
        group: &DuplicateGroup,
    ) -> Result<MergeResult> {
        guard.ensure_covers(ctx, &group.institution_id)?;

        let connections = self.institution_connections(ctx, &group.institution_id)?;
        let current = self.account_repository.get_by_ids(&group.account_ids())?;
        if let Some(foreign) = current
            .iter()
            .find(|a| !connections.contains_key(&a.connection_id))
        {
            return Err(Error::not_found("Account", foreign.id.clone()));
        }

        let active: Vec<Account> = current.into_iter().filter(|a| !a.is_archived).collect();
        if active.len() <= 1 {
            debug!(
                "Duplicate group in institution {} already collapsed; nothing to merge",
                group.institution_id
            );
            return Ok(MergeResult::noop(active.first().map(|a| a.id.clone())));
        }

        let usable: HashSet<String> = connections
            .values()
            .filter(|c| c.is_usable())
            .map(|c| c.id.clone())
            .collect();
        let active_ids: Vec<String> = active.iter().map(|a| a.id.clone()).collect();
        let activity = self.account_repository.activity(&active_ids)?;

        let survivor = choose_survivor(&active, &usable, &activity)
            .ok_or_else(|| Error::Unexpected("duplicate group has no members".to_string()))?;
        let losers: Vec<String> = active_ids
            .iter()
            .filter(|id| **id != survivor.id)
            .cloned()
            .collect();

        info!(
            "Merging {} duplicate account(s) into {} for institution {}",
            losers.len(),
            survivor.id,
            group.institution_id
        );
        self.merge_store.merge_accounts(&survivor.id, losers).await
    }

    /// Gated merge of every group while the caller holds the institution's section.
    pub async fn auto_merge_locked(
        &self,
        guard: &InstitutionGuard,
        ctx: &UserContext,
        institution_id: &str,
    ) -> Result<AutoMergeSummary> {
        guard.ensure_covers(ctx, institution_id)?;

        let mut summary = AutoMergeSummary {
            institution_id: institution_id.to_string(),
            ..Default::default()
        };
        for group in self.detect_duplicate_groups(ctx, institution_id)? {
            if group.should_merge() {
                let result = self.merge_locked(guard, ctx, &group).await?;
                summary.merged.push(result);
            } else {
                info!(
                    "Surfacing {} unmasked look-alike accounts in institution {} for review",
                    group.accounts.len(),
                    institution_id
                );
                summary.surfaced.push(group);
            }
        }
        Ok(summary)
    }
}

#[async_trait::async_trait]
impl DuplicateServiceTrait for DuplicateService {
    fn detect_duplicate_groups(
        &self,
        ctx: &UserContext,
        institution_id: &str,
    ) -> Result<Vec<DuplicateGroup>> {
        let accounts =
            self.account_repository
                .list_for_institution(ctx.user_id(), institution_id, false)?;
        Ok(group_duplicates(institution_id, &accounts))
    }

    fn detect_duplicates(
        &self,
        ctx: &UserContext,
        institution_id: &str,
    ) -> Result<Option<DuplicateGroup>> {
        Ok(self
            .detect_duplicate_groups(ctx, institution_id)?
            .into_iter()
            .next())
    }

    async fn merge(&self, ctx: &UserContext, group: &DuplicateGroup) -> Result<MergeResult> {
        let guard = self.locks.acquire(ctx, &group.institution_id).await;
        self.merge_locked(&guard, ctx, group).await
    }

    async fn auto_merge(&self, ctx: &UserContext, institution_id: &str) -> Result<AutoMergeSummary> {
        let guard = self.locks.acquire(ctx, institution_id).await;
        self.auto_merge_locked(&guard, ctx, institution_id).await
    }

    async fn merge_accounts(
        &self,
        ctx: &UserContext,
        account_ids: Vec<String>,
    ) -> Result<MergeResult> {
        let mut account_ids = account_ids;
        account_ids.sort();
        account_ids.dedup();
        if account_ids.len() < 2 {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "At least two accounts are needed for a merge".to_string(),
            )));
        }

        let accounts = self.account_repository.get_by_ids(&account_ids)?;
        if let Some(missing) = account_ids
            .iter()
            .find(|id| !accounts.iter().any(|a| &a.id == *id))
        {
            return Err(Error::not_found("Account", missing.clone()));
        }

        let mut institution_id: Option<String> = None;
        for account in &accounts {
            let connection = self.connection_repository.get_by_id(&account.connection_id)?;
            if !ctx.owns(&connection.user_id) {
                return Err(Error::not_found("Account", account.id.clone()));
            }
            match &institution_id {
                None => institution_id = Some(connection.institution_id),
                Some(existing) if *existing != connection.institution_id => {
                    return Err(Error::Validation(ValidationError::InvalidInput(
                        "Accounts belong to different institutions".to_string(),
                    )));
                }
                Some(_) => {}
            }
        }
        let institution_id = institution_id
            .ok_or_else(|| Error::Unexpected("merge without accounts".to_string()))?;

        let group = DuplicateGroup {
            institution_id,
            key: DuplicateKey::for_account(&accounts[0]),
            accounts,
        };
        let guard = self.locks.acquire(ctx, &group.institution_id).await;
        self.merge_locked(&guard, ctx, &group).await
    }
}
