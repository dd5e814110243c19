use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::info;

use crate::{
    auth::CurrentUser,
    error::ApiResult,
    main_lib::AppState,
    models::RecordedResponse,
};
use finlink_connect::{LinkRequest, LinkResult};
use finlink_core::{connections::InstitutionConnection, providers::RemoteLiability};

async fn link(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
    Json(body): Json<LinkRequest>,
) -> ApiResult<Json<LinkResult>> {
    let result = state.link_service.link(&ctx, body).await?;
    info!(
        user_id = ctx.user_id(),
        connection_id = %result.connection.id,
        created = result.reconciliation.created,
        updated = result.reconciliation.updated,
        "Linked institution {}",
        result.connection.institution_id
    );
    Ok(Json(result))
}

async fn list_connections(
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
) -> ApiResult<Json<Vec<InstitutionConnection>>> {
    let connections = state.connection_repository.list_for_user(ctx.user_id())?;
    Ok(Json(connections))
}

async fn disconnect(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
) -> ApiResult<Json<InstitutionConnection>> {
    let connection = state.link_service.disconnect(&ctx, &id).await?;
    Ok(Json(connection))
}

async fn liabilities(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
) -> ApiResult<Json<Vec<RemoteLiability>>> {
    let liabilities = state.link_service.liabilities(&ctx, &id).await?;
    Ok(Json(liabilities))
}

async fn refresh_balances(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    CurrentUser(ctx): CurrentUser,
) -> ApiResult<Json<RecordedResponse>> {
    let recorded = state.link_service.refresh_balances(&ctx, &id).await?;
    Ok(Json(RecordedResponse { recorded }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/connections/link", post(link))
        .route("/connections", get(list_connections))
        .route("/connections/{id}", delete(disconnect))
        .route("/connections/{id}/liabilities", get(liabilities))
        .route("/connections/{id}/balances/refresh", post(refresh_balances))
}
