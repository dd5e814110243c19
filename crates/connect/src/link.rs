//! Link, relink, disconnect and purge of institution connections.

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use finlink_core::accounts::AccountRepositoryTrait;
use finlink_core::balances::{BalanceRepositoryTrait, NewBalance};
use finlink_core::connections::{
    ConnectionRepositoryTrait, ConnectionStatus, InstitutionConnection, NewConnection,
};
use finlink_core::duplicates::{AutoMergeSummary, DuplicateService};
use finlink_core::errors::{Error, Result, ValidationError};
use finlink_core::locks::InstitutionLocks;
use finlink_core::providers::{RemoteAccount, RemoteLiability, TokenExchange, PROVIDER_PLAID};
use finlink_core::reconciliation::ReconcileResult;
use finlink_core::sync::SyncError;
use finlink_core::UserContext;

use crate::aggregator::{flag_if_credential_invalid, AggregatorClient};
use crate::reconcile::ReconciliationEngine;

/// Public token handed over by the client-side link widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest {
    pub public_token: String,
    pub institution_id: Option<String>,
    pub institution_name: Option<String>,
    pub institution_logo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResult {
    pub connection: InstitutionConnection,
    /// The item was already known and only its credential was replaced.
    pub credentials_refreshed: bool,
    pub merged_before: AutoMergeSummary,
    pub reconciliation: ReconcileResult,
    pub merged_after: AutoMergeSummary,
    pub balances_recorded: usize,
}

pub struct LinkService {
    account_repository: Arc<dyn AccountRepositoryTrait>,
    connection_repository: Arc<dyn ConnectionRepositoryTrait>,
    balance_repository: Arc<dyn BalanceRepositoryTrait>,
    duplicates: Arc<DuplicateService>,
    reconciler: Arc<ReconciliationEngine>,
    client: Arc<dyn AggregatorClient>,
    locks: Arc<InstitutionLocks>,
}

impl LinkService {
    pub fn new(
        account_repository: Arc<dyn AccountRepositoryTrait>,
        connection_repository: Arc<dyn ConnectionRepositoryTrait>,
        balance_repository: Arc<dyn BalanceRepositoryTrait>,
        duplicates: Arc<DuplicateService>,
        reconciler: Arc<ReconciliationEngine>,
        client: Arc<dyn AggregatorClient>,
        locks: Arc<InstitutionLocks>,
    ) -> Self {
        Self {
            account_repository,
            connection_repository,
            balance_repository,
            duplicates,
            reconciler,
            client,
            locks,
        }
    }

    fn owned_connection(
        &self,
        ctx: &UserContext,
        connection_id: &str,
    ) -> Result<InstitutionConnection> {
        let connection = self.connection_repository.get_by_id(connection_id)?;
        if !ctx.owns(&connection.user_id) {
            return Err(Error::not_found("Connection", connection_id));
        }
        Ok(connection)
    }

    fn usable_connection(
        &self,
        ctx: &UserContext,
        connection_id: &str,
    ) -> Result<InstitutionConnection> {
        let connection = self.owned_connection(ctx, connection_id)?;
        if let Some(reason) = connection.ineligibility_reason() {
            return Err(SyncError::Ineligible(reason.to_string()).into());
        }
        Ok(connection)
    }

    async fn fetch_accounts(&self, connection: &InstitutionConnection) -> Result<Vec<RemoteAccount>> {
        match self.client.get_accounts(connection).await {
            Ok(accounts) => Ok(accounts),
            Err(err) => {
                flag_if_credential_invalid(self.connection_repository.as_ref(), connection, &err)
                    .await;
                Err(err)
            }
        }
    }

    /// Stores the exchanged credential, creating the connection for a new item.
    async fn store_credentials(
        &self,
        ctx: &UserContext,
        request: &LinkRequest,
        exchange: TokenExchange,
        institution_id: String,
    ) -> Result<(InstitutionConnection, bool)> {
        if let Some(existing) = self.connection_repository.get_by_item_id(&exchange.item_id)? {
            return self.refresh_credentials(ctx, existing, exchange.access_token).await;
        }

        let new_connection = NewConnection {
            id: None,
            user_id: ctx.user_id().to_string(),
            item_id: exchange.item_id.clone(),
            access_token: exchange.access_token.clone(),
            institution_id,
            institution_name: request.institution_name.clone(),
            institution_logo: request.institution_logo.clone(),
            provider: PROVIDER_PLAID.to_string(),
        };
        match self.connection_repository.create(new_connection).await {
            Ok(connection) => Ok((connection, false)),
            Err(err) if err.is_unique_violation() => {
                warn!(
                    "Item {} was linked concurrently; updating the existing connection",
                    exchange.item_id
                );
                let existing = self
                    .connection_repository
                    .get_by_item_id(&exchange.item_id)?
                    .ok_or_else(|| Error::not_found("Connection", exchange.item_id.clone()))?;
                self.refresh_credentials(ctx, existing, exchange.access_token)
                    .await
            }
            Err(err) => Err(err),
        }
    }

    async fn refresh_credentials(
        &self,
        ctx: &UserContext,
        existing: InstitutionConnection,
        access_token: String,
    ) -> Result<(InstitutionConnection, bool)> {
        if !ctx.owns(&existing.user_id) {
            return Err(Error::Conflict(format!(
                "Item {} is linked to another user",
                existing.item_id
            )));
        }
        let connection = self
            .connection_repository
            .update_credentials(&existing.id, access_token)
            .await?;
        Ok((connection, true))
    }

    /// Links an institution, or relinks one the user already has.
    ///
    /// Under the institution's section: merges existing duplicates, reconciles
    /// the local accounts onto the fresh account list, records balance
    /// snapshots and merges again.
    pub async fn link(&self, ctx: &UserContext, request: LinkRequest) -> Result<LinkResult> {
        if request.public_token.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "publicToken".to_string(),
            )));
        }

        let exchange = self
            .client
            .exchange_public_token(&request.public_token)
            .await?;
        let item = self.client.get_item(&exchange.access_token).await?;
        let institution_id = request
            .institution_id
            .clone()
            .or(item.institution_id)
            .ok_or_else(|| {
                Error::Validation(ValidationError::MissingField("institutionId".to_string()))
            })?;

        let (connection, credentials_refreshed) = self
            .store_credentials(ctx, &request, exchange, institution_id.clone())
            .await?;
        info!(
            "Linked item {} for institution {} (connection {}, refreshed: {})",
            connection.item_id, institution_id, connection.id, credentials_refreshed
        );

        let guard = self.locks.acquire(ctx, &institution_id).await;
        let merged_before = self
            .duplicates
            .auto_merge_locked(&guard, ctx, &institution_id)
            .await?;

        let fresh = self.fetch_accounts(&connection).await?;
        let reconciliation = self
            .reconciler
            .reconcile_locked(&guard, ctx, &connection, &fresh)
            .await?;
        let balances_recorded = self.record_balances(&connection, &fresh).await?;

        let merged_after = self
            .duplicates
            .auto_merge_locked(&guard, ctx, &institution_id)
            .await?;

        Ok(LinkResult {
            connection,
            credentials_refreshed,
            merged_before,
            reconciliation,
            merged_after,
            balances_recorded,
        })
    }

    async fn record_balances(
        &self,
        connection: &InstitutionConnection,
        fresh: &[RemoteAccount],
    ) -> Result<usize> {
        let local: HashMap<String, String> = self
            .account_repository
            .list_for_connection(&connection.id)?
            .into_iter()
            .filter(|a| !a.is_archived)
            .map(|a| (a.remote_account_id, a.id))
            .collect();
        let as_of = Utc::now().naive_utc();
        let snapshots: Vec<NewBalance> = fresh
            .iter()
            .filter_map(|remote| {
                local
                    .get(&remote.remote_account_id)
                    .map(|account_id| NewBalance::from_remote(account_id, &remote.balances, as_of))
            })
            .collect();
        if snapshots.is_empty() {
            return Ok(0);
        }
        self.balance_repository.insert_many(snapshots).await
    }

    /// Records a balance snapshot for every active account of the connection.
    pub async fn refresh_balances(&self, ctx: &UserContext, connection_id: &str) -> Result<usize> {
        let connection = self.usable_connection(ctx, connection_id)?;
        let fresh = self.fetch_accounts(&connection).await?;
        self.record_balances(&connection, &fresh).await
    }

    pub async fn liabilities(
        &self,
        ctx: &UserContext,
        connection_id: &str,
    ) -> Result<Vec<RemoteLiability>> {
        let connection = self.usable_connection(ctx, connection_id)?;
        match self.client.get_liabilities(&connection).await {
            Ok(liabilities) => Ok(liabilities),
            Err(err) => {
                flag_if_credential_invalid(self.connection_repository.as_ref(), &connection, &err)
                    .await;
                Err(err)
            }
        }
    }

    /// Removes the item remotely and marks the connection disconnected.
    ///
    /// A credential the aggregator already rejects counts as removed.
    pub async fn disconnect(
        &self,
        ctx: &UserContext,
        connection_id: &str,
    ) -> Result<InstitutionConnection> {
        let connection = self.owned_connection(ctx, connection_id)?;
        if connection.status == ConnectionStatus::Disconnected {
            return Ok(connection);
        }

        if !connection.is_manual() {
            if let Err(err) = self.client.remove_item(&connection).await {
                let already_gone = err
                    .as_provider()
                    .map(|p| p.is_credential_invalid())
                    .unwrap_or(false);
                if !already_gone {
                    return Err(err);
                }
                info!(
                    "Item {} was already invalid remotely; disconnecting locally",
                    connection.item_id
                );
            }
        }

        let connection = self
            .connection_repository
            .mark_disconnected(connection_id)
            .await?;
        info!("Disconnected connection {}", connection.id);
        Ok(connection)
    }

    /// Deletes the connection with its accounts and their history.
    ///
    /// Remote removal is attempted first and only logged when it fails.
    pub async fn purge(&self, connection_id: &str) -> Result<usize> {
        let connection = self.connection_repository.get_by_id(connection_id)?;
        if connection.is_usable() {
            if let Err(e) = self.client.remove_item(&connection).await {
                warn!(
                    "Could not remove item {} before purge: {}",
                    connection.item_id, e
                );
            }
        }
        let deleted = self.connection_repository.delete(connection_id).await?;
        info!("Purged connection {} ({} row)", connection_id, deleted);
        Ok(deleted)
    }
}
