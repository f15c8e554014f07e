//! Per-task worker pipeline.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::{CancelHandle, LiveSetGuard, WorkerContext};
use crate::domain::{Task, TaskStatus};
use crate::ffmpeg::{self, ExecutionRequest};
use crate::hooks::{self, HookPhase};
use crate::wildcards;

/// Drive one task from QUEUED to a terminal status.
///
/// The live-set guard removes this task's cancellation handle when the
/// worker returns, whatever the outcome.
pub async fn process_task(
    ctx: Arc<WorkerContext>,
    mut task: Task,
    handle: Arc<CancelHandle>,
    _guard: LiveSetGuard,
) {
    task.started_at = Utc::now().timestamp_millis();
    info!("processing task (uuid: {})", task.uuid);

    if let Err(e) = hooks::run(&mut task, HookPhase::Pre, &ctx).await {
        fail_task(&ctx, &mut task, &format!("pre-processing failed: {}", e)).await;
        return;
    }

    // A cancel that landed during the pre phase terminates the task before
    // the encoder is ever invoked.
    if let Some(cause) = handle.cause() {
        cancel_task(&ctx, &mut task, &cause).await;
        return;
    }

    if !ctx.encoder.is_available() {
        fail_task(&ctx, &mut task, "encoder binary not available").await;
        return;
    }

    let encoder = ctx.encoder.current();
    let input_file = wildcards::resolve(
        &task.input_file.raw,
        &task.input_file.raw,
        &task.output_file.raw,
        &task.source,
        task.metadata.as_ref(),
        &encoder,
    );
    let output_file = wildcards::resolve(
        &task.output_file.raw,
        &task.input_file.raw,
        &task.output_file.raw,
        &task.source,
        task.metadata.as_ref(),
        &encoder,
    );
    task.input_file.resolved = input_file.clone();
    task.output_file.resolved = output_file.clone();
    task.command.resolved = wildcards::resolve(
        &task.command.raw,
        &input_file,
        &output_file,
        &task.source,
        task.metadata.as_ref(),
        &encoder,
    );
    task.status = TaskStatus::Running;
    ctx.tasks.update_task(&task).await;

    // The output directory must exist before the encoder opens its target.
    if let Some(parent) = Path::new(&task.output_file.resolved).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                fail_task(
                    &ctx,
                    &mut task,
                    &format!("failed to create non-existing output directory: {}", e),
                )
                .await;
                return;
            }
        }
    }

    info!("starting encoding (uuid: {})", task.uuid);
    let (progress_tx, mut progress_rx) = mpsc::channel(32);
    let request = ExecutionRequest {
        task_uuid: task.uuid.clone(),
        command: task.command.resolved.clone(),
        encoder,
        cancel: handle.token(),
    };

    let execution = ffmpeg::execute(&request, progress_tx);
    tokio::pin!(execution);

    let result = loop {
        tokio::select! {
            result = &mut execution => break result,
            Some(update) = progress_rx.recv() => {
                // Progress is monotonic while RUNNING.
                task.progress = task.progress.max(update.percent);
                task.remaining = update.remaining;
                ctx.tasks.update_task(&task).await;
            }
        }
    };

    task.progress = 100.0;
    task.remaining = -1.0;

    if let Err(e) = result {
        error!("finished encoding with error (uuid: {}): {}", task.uuid, e);
        match handle.cause() {
            Some(cause) => cancel_task(&ctx, &mut task, &cause).await,
            None => fail_task(&ctx, &mut task, &e.to_string()).await,
        }
        return;
    }

    info!("finished encoding (uuid: {})", task.uuid);

    if let Err(e) = hooks::run(&mut task, HookPhase::Post, &ctx).await {
        fail_task(&ctx, &mut task, &format!("post-processing failed: {}", e)).await;
        return;
    }

    task.finished_at = Utc::now().timestamp_millis();
    task.status = TaskStatus::DoneSuccessful;
    ctx.tasks.update_task(&task).await;
    info!("task successful (uuid: {})", task.uuid);
}

async fn fail_task(ctx: &WorkerContext, task: &mut Task, error: &str) {
    task.finished_at = Utc::now().timestamp_millis();
    task.progress = 100.0;
    task.remaining = -1.0;
    task.status = TaskStatus::DoneError;
    task.error = error.to_string();
    ctx.tasks.update_task(task).await;
    warn!("task failed (uuid: {}): {}", task.uuid, error);
}

async fn cancel_task(ctx: &WorkerContext, task: &mut Task, cause: &str) {
    task.finished_at = Utc::now().timestamp_millis();
    task.progress = 100.0;
    task.remaining = -1.0;
    task.status = TaskStatus::DoneCanceled;
    task.error = cause.to_string();
    ctx.tasks.update_task(task).await;
    warn!("task canceled (uuid: {}): {}", task.uuid, cause);
}
