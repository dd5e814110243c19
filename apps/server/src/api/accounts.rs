use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};

use crate::{
    auth::CurrentUser,
    error::ApiResult,
    main_lib::AppState,
    models::{AccountsQuery, UpdateAccountRequest},
};
use finlink_core::{
    accounts::Account, connections::InstitutionConnection, Error, UserContext,
};

/// Loads an account of the caller. Accounts of other users read as missing.
pub(crate) fn owned_account(
    state: &AppState,
    ctx: &UserContext,
    account_id: &str,
) -> ApiResult<Account> {
    owned_account_with_connection(state, ctx, account_id).map(|(account, _)| account)
}

/// Like [`owned_account`], also returning the account's connection.
pub(crate) fn owned_account_with_connection(
    state: &AppState,
    ctx: &UserContext,
    account_id: &str,
) -> ApiResult<(Account, InstitutionConnection)> {
    let account = state.account_repository.get_by_id(account_id)?;
    let connection = state
        .connection_repository
        .get_by_id(&account.connection_id)?;
    if !ctx.owns(&connection.user_id) {
        return Err(Error::not_found("Account", account_id).into());
    }
    Ok((account, connection))
}

async fn list_accounts(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
    Query(q): Query<AccountsQuery>,
) -> ApiResult<Json<Vec<Account>>> {
    let accounts = state
        .account_repository
        .list_for_user(ctx.user_id(), q.include_archived)?;
    Ok(Json(accounts))
}

async fn update_account(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
    Json(body): Json<UpdateAccountRequest>,
) -> ApiResult<Json<Account>> {
    owned_account(&state, &ctx, &id)?;
    let account = state
        .account_repository
        .set_hidden(&id, body.is_hidden)
        .await?;
    Ok(Json(account))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/accounts", get(list_accounts))
        .route("/accounts/{id}", patch(update_account))
}
