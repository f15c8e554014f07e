use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use ffqueue::api::{self, ApiServerConfig, AppState};
use ffqueue::config::{EncoderLocator, ServerConfig};
use ffqueue::database::repositories::{
    SqlxPresetRepository, SqlxTaskRepository, SqlxWebhookRepository, WebhookRepository,
};
use ffqueue::events::{EventBus, WebhookDispatcher};
use ffqueue::queue::{TaskScheduler, WorkerContext};
use ffqueue::service::{PresetService, TaskService, WebhookService};
use ffqueue::{database, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = ServerConfig::parse();

    let logs = logging::init(&config.loglevel);
    info!(
        "ffqueue starting (port: {}, max concurrent tasks: {})",
        config.port, config.max_concurrent_tasks
    );

    let pool = database::init_pool(&config.database).await?;
    database::run_migrations(&pool).await?;

    let task_repository = Arc::new(SqlxTaskRepository::new(pool.clone()));
    let webhook_repository: Arc<dyn WebhookRepository> =
        Arc::new(SqlxWebhookRepository::new(pool.clone()));
    let preset_repository = Arc::new(SqlxPresetRepository::new(pool.clone()));

    let bus = EventBus::new();
    let shutdown = CancellationToken::new();

    let encoder = EncoderLocator::new(config.ffmpeg.clone());
    encoder.spawn_discovery(shutdown.clone());

    let (cancel_tx, cancel_rx) = mpsc::unbounded_channel();
    let tasks = Arc::new(TaskService::new(task_repository, bus.clone(), cancel_tx));
    let webhooks = Arc::new(WebhookService::new(webhook_repository.clone(), bus.clone()));
    let presets = Arc::new(PresetService::new(preset_repository, bus.clone()));

    WebhookDispatcher::new(webhook_repository).start(&bus, shutdown.clone());

    let scheduler = TaskScheduler::new(
        config.max_concurrent_tasks,
        WorkerContext {
            tasks: tasks.clone(),
            encoder: encoder.clone(),
        },
        shutdown.clone(),
    );
    scheduler.start(cancel_rx);

    let state = AppState::new(tasks, webhooks, presets, bus, logs);
    let api_config = ApiServerConfig {
        port: config.port,
        ..Default::default()
    };

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            trigger.cancel();
        }
    });

    api::serve(&api_config, state, shutdown).await?;
    info!("ffqueue stopped");
    Ok(())
}
