use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use crate::{
    api::accounts::owned_account_with_connection,
    auth::CurrentUser,
    error::{ApiError, ApiResult},
    main_lib::AppState,
    models::{DownloadLogsQuery, ForceQuery},
};
use finlink_connect::BatchSyncSummary;
use finlink_core::{
    limits::{RateLimitServiceTrait, RateLimitStatus},
    sync::{DownloadLog, SyncError},
    Error as CoreError, UserContext,
};

const DEFAULT_LOG_LIMIT: i64 = 20;
const MAX_LOG_LIMIT: i64 = 200;

async fn sync_account(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
    Query(q): Query<ForceQuery>,
) -> ApiResult<Json<BatchSyncSummary>> {
    let (account, connection) = owned_account_with_connection(&state, &ctx, &id)?;
    // Ineligible accounts are refused before they use up an allowance slot.
    let reason = if account.is_archived {
        Some("account is archived")
    } else {
        connection.ineligibility_reason()
    };
    if let Some(reason) = reason {
        return Err(CoreError::Sync(SyncError::Ineligible(reason.to_string())).into());
    }
    state.rate_limiter.acquire(&ctx).await?;

    let result = state
        .sync_orchestrator
        .sync_account(&ctx, &id, q.force)
        .await;
    let mut summary = BatchSyncSummary::default();
    summary.push(result);
    Ok(Json(summary))
}

async fn sync_user(
    state: &AppState,
    ctx: &UserContext,
    force: bool,
) -> ApiResult<Json<BatchSyncSummary>> {
    let status = state.rate_limiter.acquire(ctx).await?;
    info!(
        user_id = ctx.user_id(),
        remaining = status.remaining,
        force,
        "Manual sync of all accounts"
    );
    let cancel = state.shutdown.child_token();
    let summary = state
        .sync_orchestrator
        .sync_user(ctx, force, &cancel)
        .await?;
    Ok(Json(summary))
}

async fn sync_all(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
) -> ApiResult<Json<BatchSyncSummary>> {
    sync_user(&state, &ctx, false).await
}

async fn force_sync_all(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
) -> ApiResult<Json<BatchSyncSummary>> {
    sync_user(&state, &ctx, true).await
}

async fn rate_limit_status(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
) -> ApiResult<Json<RateLimitStatus>> {
    Ok(Json(state.rate_limiter.status(&ctx)?))
}

async fn download_logs(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
    Query(q): Query<DownloadLogsQuery>,
) -> ApiResult<Json<Vec<DownloadLog>>> {
    let account_id = q
        .account_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("accountId is required".to_string()))?;
    let limit = q
        .limit
        .unwrap_or(DEFAULT_LOG_LIMIT)
        .clamp(1, MAX_LOG_LIMIT);
    let logs = state.sync_service.recent_logs(&ctx, &account_id, limit)?;
    Ok(Json(logs))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sync/accounts", post(sync_all))
        .route("/sync/accounts/force", post(force_sync_all))
        .route("/sync/accounts/{id}", post(sync_account))
        .route("/sync/rate-limit", get(rate_limit_status))
        .route("/sync/download-logs", get(download_logs))
}
