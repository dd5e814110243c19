//! Operator endpoints: purge, balance maintenance and the call ledger audit.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::{
    auth::CurrentUser,
    error::ApiResult,
    main_lib::AppState,
    models::{CallSummaryQuery, CollapseBalancesRequest, DeletedResponse, RemovedResponse},
};
use finlink_core::provider_calls::ProviderCallSummary;

const DEFAULT_SUMMARY_HOURS: i64 = 24;
/// Thirty days.
const MAX_SUMMARY_HOURS: i64 = 24 * 30;

async fn purge_connection(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
) -> ApiResult<Json<DeletedResponse>> {
    warn!(
        operator = ctx.user_id(),
        connection_id = %id,
        "Purging connection with its accounts and history"
    );
    let deleted = state.link_service.purge(&id).await?;
    Ok(Json(DeletedResponse { deleted }))
}

async fn collapse_balances(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
    Json(body): Json<CollapseBalancesRequest>,
) -> ApiResult<Json<RemovedResponse>> {
    let removed = state
        .balance_repository
        .collapse_monthly(body.account_ids)
        .await?;
    info!(
        operator = ctx.user_id(),
        removed, "Collapsed balance history to month ends"
    );
    Ok(Json(RemovedResponse { removed }))
}

async fn call_summary(
    State(state): State<Arc<AppState>>,
    CurrentUser(_ctx): CurrentUser,
    Query(q): Query<CallSummaryQuery>,
) -> ApiResult<Json<Vec<ProviderCallSummary>>> {
    let hours = q
        .since_hours
        .unwrap_or(DEFAULT_SUMMARY_HOURS)
        .clamp(1, MAX_SUMMARY_HOURS);
    let since = (Utc::now() - Duration::hours(hours)).naive_utc();
    let summary = state.provider_call_repository.summary_since(since)?;
    Ok(Json(summary))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/connections/{id}", delete(purge_connection))
        .route("/maintenance/balances/collapse", post(collapse_balances))
        .route("/provider-calls/summary", get(call_summary))
}
