//! Webhook routes.

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
use crate::domain::{NewWebhook, Webhook};

const DOCS_WEBHOOKS: &str = "https://docs.ffqueue.dev/webhooks";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_webhook).get(list_webhooks))
        .route(
            "/{uuid}",
            get(get_webhook).put(update_webhook).delete(delete_webhook),
        )
}

async fn create_webhook(
    State(state): State<AppState>,
    Json(payload): Json<NewWebhook>,
) -> ApiResult<Json<Webhook>> {
    let webhook = state
        .webhooks
        .create(payload)
        .await
        .map_err(|e| from_error(e, DOCS_WEBHOOKS))?;
    Ok(Json(webhook))
}

async fn list_webhooks(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let (webhooks, total) = state
        .webhooks
        .list(&params.pagination())
        .await
        .map_err(|e| from_error(e, DOCS_WEBHOOKS))?;
    Ok(([("X-Total", total.to_string())], Json(webhooks)))
}

async fn get_webhook(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> ApiResult<Json<Webhook>> {
    let webhook = state
        .webhooks
        .get(&uuid)
        .await
        .map_err(|e| from_error(e, DOCS_WEBHOOKS))?;
    Ok(Json(webhook))
}

async fn update_webhook(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    Json(payload): Json<NewWebhook>,
) -> ApiResult<Json<Webhook>> {
    let webhook = state
        .webhooks
        .update(&uuid, payload)
        .await
        .map_err(|e| from_error(e, DOCS_WEBHOOKS))?;
    Ok(Json(webhook))
}

async fn delete_webhook(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .webhooks
        .delete(&uuid)
        .await
        .map_err(|e| from_error(e, DOCS_WEBHOOKS))?;
    Ok(StatusCode::NO_CONTENT)
}
