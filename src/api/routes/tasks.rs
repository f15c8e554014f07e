//! Task routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use super::PageParams;
use crate::api::error::{from_error, ApiResult};
use crate::api::server::AppState;
use crate::domain::{NewTask, Task};

const DOCS_TASKS: &str = "https://docs.ffqueue.dev/tasks";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_task).get(list_tasks))
        .route("/{uuid}", get(get_task).delete(delete_task))
        .route("/{uuid}/cancel", post(cancel_task))
}

async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<NewTask>,
) -> ApiResult<Json<Task>> {
    let task = state
        .tasks
        .create(payload, "api")
        .await
        .map_err(|e| from_error(e, DOCS_TASKS))?;
    Ok(Json(task))
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let (tasks, total) = state
        .tasks
        .list(&params.pagination())
        .await
        .map_err(|e| from_error(e, DOCS_TASKS))?;
    Ok(([("X-Total", total.to_string())], Json(tasks)))
}

async fn get_task(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Task>> {
    let task = state
        .tasks
        .get(&uuid)
        .await
        .map_err(|e| from_error(e, DOCS_TASKS))?;
    Ok(Json(task))
}

async fn cancel_task(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Task>> {
    let task = state
        .tasks
        .cancel(&uuid)
        .await
        .map_err(|e| from_error(e, DOCS_TASKS))?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .tasks
        .delete(&uuid)
        .await
        .map_err(|e| from_error(e, DOCS_TASKS))?;
    Ok(StatusCode::NO_CONTENT)
}
