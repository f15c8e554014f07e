//! API server setup.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::routes;
use crate::error::Result;
use crate::events::EventBus;
use crate::logging::LogBroadcaster;
use crate::service::{PresetService, TaskService, WebhookService};

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            enable_cors: true,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub start_time: Instant,
    pub tasks: Arc<TaskService>,
    pub webhooks: Arc<WebhookService>,
    pub presets: Arc<PresetService>,
    pub bus: EventBus,
    pub logs: LogBroadcaster,
}

impl AppState {
    pub fn new(
        tasks: Arc<TaskService>,
        webhooks: Arc<WebhookService>,
        presets: Arc<PresetService>,
        bus: EventBus,
        logs: LogBroadcaster,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            tasks,
            webhooks,
            presets,
            bus,
            logs,
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState, enable_cors: bool) -> Router {
    let mut router = Router::new()
        .nest("/v1/tasks", routes::tasks::router())
        .nest("/v1/webhooks", routes::webhooks::router())
        .nest("/v1/presets", routes::presets::router())
        .merge(routes::health::router())
        .merge(routes::ws::router())
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.with_state(state)
}

/// Bind and serve until the shutdown token fires.
pub async fn serve(
    config: &ApiServerConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .map_err(|e| crate::Error::config(format!("invalid bind address: {}", e)))?;

    let app = build_router(state, config.enable_cors);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("server is listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
