//! Preset routes.

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
use crate::domain::{NewPreset, Preset};

const DOCS_PRESETS: &str = "https://docs.ffqueue.dev/presets";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_preset).get(list_presets))
        .route(
            "/{uuid}",
            get(get_preset).put(update_preset).delete(delete_preset),
        )
}

async fn create_preset(
    State(state): State<AppState>,
    Json(payload): Json<NewPreset>,
) -> ApiResult<Json<Preset>> {
    let preset = state
        .presets
        .create(payload)
        .await
        .map_err(|e| from_error(e, DOCS_PRESETS))?;
    Ok(Json(preset))
}

async fn list_presets(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let (presets, total) = state
        .presets
        .list(&params.pagination())
        .await
        .map_err(|e| from_error(e, DOCS_PRESETS))?;
    Ok(([("X-Total", total.to_string())], Json(presets)))
}

async fn get_preset(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Preset>> {
    let preset = state
        .presets
        .get(&uuid)
        .await
        .map_err(|e| from_error(e, DOCS_PRESETS))?;
    Ok(Json(preset))
}

async fn update_preset(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    Json(payload): Json<NewPreset>,
) -> ApiResult<Json<Preset>> {
    let preset = state
        .presets
        .update(&uuid, payload)
        .await
        .map_err(|e| from_error(e, DOCS_PRESETS))?;
    Ok(Json(preset))
}

async fn delete_preset(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .presets
        .delete(&uuid)
        .await
        .map_err(|e| from_error(e, DOCS_PRESETS))?;
    Ok(StatusCode::NO_CONTENT)
}
