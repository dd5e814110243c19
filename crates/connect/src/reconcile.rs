//! Reconnection reconciliation against the aggregator's fresh account list.

use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use finlink_core::accounts::AccountRepositoryTrait;
use finlink_core::connections::{ConnectionRepositoryTrait, InstitutionConnection};
use finlink_core::errors::{Error, Result};
use finlink_core::locks::{InstitutionGuard, InstitutionLocks};
use finlink_core::providers::RemoteAccount;
use finlink_core::reconciliation::{
    plan_reconciliation, AppliedReconciliation, ReconcileResult, ReconciliationStoreTrait,
};
use finlink_core::UserContext;

use crate::aggregator::{flag_if_credential_invalid, AggregatorClient};

pub struct ReconciliationEngine {
    account_repository: Arc<dyn AccountRepositoryTrait>,
    connection_repository: Arc<dyn ConnectionRepositoryTrait>,
    store: Arc<dyn ReconciliationStoreTrait>,
    client: Arc<dyn AggregatorClient>,
    locks: Arc<InstitutionLocks>,
}

impl ReconciliationEngine {
    pub fn new(
        account_repository: Arc<dyn AccountRepositoryTrait>,
        connection_repository: Arc<dyn ConnectionRepositoryTrait>,
        store: Arc<dyn ReconciliationStoreTrait>,
        client: Arc<dyn AggregatorClient>,
        locks: Arc<InstitutionLocks>,
    ) -> Self {
        Self {
            account_repository,
            connection_repository,
            store,
            client,
            locks,
        }
    }

    /// Newest usable connection of the user at the institution.
    fn newest_usable_connection(
        &self,
        ctx: &UserContext,
        institution_id: &str,
    ) -> Result<InstitutionConnection> {
        self.connection_repository
            .list_for_institution(ctx.user_id(), institution_id)?
            .into_iter()
            .filter(|c| c.is_usable())
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
            .ok_or_else(|| Error::not_found("Active connection", institution_id))
    }

    /// Re-matches the institution's local accounts to the newest connection's
    /// account list.
    pub async fn reconcile(
        &self,
        ctx: &UserContext,
        institution_id: &str,
    ) -> Result<ReconcileResult> {
        let guard = self.locks.acquire(ctx, institution_id).await;
        let connection = self.newest_usable_connection(ctx, institution_id)?;

        let fresh = match self.client.get_accounts(&connection).await {
            Ok(fresh) => fresh,
            Err(err) => {
                flag_if_credential_invalid(self.connection_repository.as_ref(), &connection, &err)
                    .await;
                return Err(err);
            }
        };
        self.reconcile_locked(&guard, ctx, &connection, &fresh).await
    }

    /// Plans and applies a reconciliation while the caller holds the
    /// institution's section.
    pub async fn reconcile_locked(
        &self,
        guard: &InstitutionGuard,
        ctx: &UserContext,
        connection: &InstitutionConnection,
        fresh: &[RemoteAccount],
    ) -> Result<ReconcileResult> {
        guard.ensure_covers(ctx, &connection.institution_id)?;
        if !ctx.owns(&connection.user_id) {
            return Err(Error::not_found("Connection", connection.id.clone()));
        }

        let locals = self.account_repository.list_for_institution(
            ctx.user_id(),
            &connection.institution_id,
            false,
        )?;
        let remote_ids: Vec<String> = fresh.iter().map(|r| r.remote_account_id.clone()).collect();
        let owners: HashMap<String, String> = self
            .account_repository
            .find_active_by_remote_ids(&remote_ids)?
            .into_iter()
            .map(|a| (a.remote_account_id, a.id))
            .collect();

        let plan = plan_reconciliation(
            &connection.institution_id,
            &connection.id,
            &locals,
            fresh,
            &owners,
        );
        for conflict in &plan.conflicts {
            warn!(
                "Reconciliation conflict in institution {}: remote account {} is held by {} (matched local {:?})",
                plan.institution_id,
                conflict.remote_account_id,
                conflict.owner_account_id,
                conflict.account_id
            );
        }

        let applied = if plan.is_empty() {
            AppliedReconciliation::default()
        } else {
            self.store.apply_reconciliation(plan.clone()).await?
        };
        let result = ReconcileResult::from_applied(&plan, applied);
        info!(
            "Reconciled institution {} onto connection {}: {} updated, {} unchanged, {} created, {} orphaned, {} conflicts",
            result.institution_id,
            result.connection_id,
            result.updated,
            result.unchanged,
            result.created,
            result.orphaned,
            result.conflicts
        );
        Ok(result)
    }
}
