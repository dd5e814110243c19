use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::{auth::CurrentUser, error::ApiResult, main_lib::AppState, models::MergeAccountsRequest};
use finlink_core::{
    duplicates::{AutoMergeSummary, DuplicateGroup, DuplicateServiceTrait, MergeResult},
    reconciliation::ReconcileResult,
};

async fn reconcile_institution(
    Path(institution_id): Path<String>,
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
) -> ApiResult<Json<ReconcileResult>> {
    let result = state.reconciler.reconcile(&ctx, &institution_id).await?;
    Ok(Json(result))
}

async fn list_duplicates(
    Path(institution_id): Path<String>,
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
) -> ApiResult<Json<Vec<DuplicateGroup>>> {
    let groups = state
        .duplicate_service
        .detect_duplicate_groups(&ctx, &institution_id)?;
    Ok(Json(groups))
}

async fn auto_merge_duplicates(
    Path(institution_id): Path<String>,
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
) -> ApiResult<Json<AutoMergeSummary>> {
    let summary = state
        .duplicate_service
        .auto_merge(&ctx, &institution_id)
        .await?;
    Ok(Json(summary))
}

/// Operator merge of accounts the detector did not group on its own.
async fn merge_accounts(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
    Json(body): Json<MergeAccountsRequest>,
) -> ApiResult<Json<MergeResult>> {
    let result = state
        .duplicate_service
        .merge_accounts(&ctx, body.account_ids)
        .await?;
    Ok(Json(result))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/institutions/{id}/reconcile", post(reconcile_institution))
        .route("/institutions/{id}/duplicates", get(list_duplicates))
        .route(
            "/institutions/{id}/duplicates/merge",
            post(auto_merge_duplicates),
        )
        .route("/duplicates/merge", post(merge_accounts))
}
