use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{error::ApiResult, main_lib::AppState};
use finlink_storage_sqlite::get_connection;

#[derive(Serialize)]
struct ProbeStatus {
    status: &'static str,
}

/// Liveness: the process is serving requests.
async fn healthz() -> Json<ProbeStatus> {
    Json(ProbeStatus { status: "ok" })
}

/// Readiness: a pooled database connection can be checked out.
async fn readyz(State(state): State<Arc<AppState>>) -> ApiResult<Json<ProbeStatus>> {
    get_connection(&state.pool)?;
    Ok(Json(ProbeStatus { status: "ready" }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}
