//! Health route.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::error::{from_error, ApiResult};
use crate::api::server::AppState;
use crate::database::repositories::TaskRepository;
use crate::domain::TaskStatus;

const DOCS_HEALTH: &str = "https://docs.ffqueue.dev/health";

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/health", get(health))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    queued: u64,
    running: u64,
}

async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let repository = state.tasks.repository();
    let queued = repository
        .count_by_status(TaskStatus::Queued)
        .await
        .map_err(|e| from_error(e, DOCS_HEALTH))?;
    let running = repository
        .count_by_status(TaskStatus::Running)
        .await
        .map_err(|e| from_error(e, DOCS_HEALTH))?;

    Ok(Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        queued,
        running,
    }))
}
