//! Pre/post-processing hook runner.
//!
//! A hook may write a sidecar file (the full task DTO as pretty JSON), run a
//! user script, and — in the pre phase — re-import the sidecar so the script
//! can modify the task before the encoder runs.

use std::path::Path;
use std::process::Stdio;

use chrono::Utc;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::domain::{Task, TaskStatus};
use crate::queue::WorkerContext;
use crate::wildcards;
use crate::{Error, Result};

/// Which side of the encoder run the hook belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Pre,
    Post,
}

impl HookPhase {
    fn status(&self) -> TaskStatus {
        match self {
            Self::Pre => TaskStatus::PreProcessing,
            Self::Post => TaskStatus::PostProcessing,
        }
    }
}

impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pre => f.write_str("pre"),
            Self::Post => f.write_str("post"),
        }
    }
}

/// Run the task's hook for `phase`, if one is configured.
///
/// Absent or empty hooks return immediately without a status transition.
/// Any error recorded on the hook fails the task.
pub async fn run(task: &mut Task, phase: HookPhase, ctx: &WorkerContext) -> Result<()> {
    let Some(hook) = task.hook(phase) else {
        return Ok(());
    };
    if hook.is_empty() {
        return Ok(());
    }
    let mut hook = hook.clone();

    info!("starting {}-processing (uuid: {})", phase, task.uuid);
    hook.started_at = Utc::now().timestamp_millis();
    task.status = phase.status();
    task.set_hook(phase, hook.clone());
    ctx.tasks.update_task(task).await;

    // The pre phase resolves against raw file templates, the post phase
    // against the materialized paths.
    let (input_file, output_file) = match phase {
        HookPhase::Pre => (task.input_file.raw.clone(), task.output_file.raw.clone()),
        HookPhase::Post => (
            task.input_file.resolved.clone(),
            task.output_file.resolved.clone(),
        ),
    };
    let encoder = ctx.encoder.current();

    if let Some(sidecar) = hook.sidecar_path.as_mut().filter(|s| !s.raw.is_empty()) {
        sidecar.resolved = wildcards::resolve(
            &sidecar.raw,
            &input_file,
            &output_file,
            &task.source,
            task.metadata.as_ref(),
            &encoder,
        );
        let sidecar_path = sidecar.resolved.clone();
        task.set_hook(phase, hook.clone());
        ctx.tasks.update_task(task).await;

        if let Err(e) = write_sidecar(task, &sidecar_path).await {
            hook.error = format!("failed to write sidecar: {}", e);
            error!("failed to write sidecar file (uuid: {}): {}", task.uuid, e);
        } else {
            debug!("wrote sidecar file (uuid: {})", task.uuid);
        }
    }

    if hook.error.is_empty() {
        if let Some(script) = hook.script_path.as_mut().filter(|s| !s.raw.is_empty()) {
            script.resolved = wildcards::resolve(
                &script.raw,
                &input_file,
                &output_file,
                &task.source,
                task.metadata.as_ref(),
                &encoder,
            );
            let script_line = script.resolved.clone();
            task.set_hook(phase, hook.clone());
            ctx.tasks.update_task(task).await;

            if let Err(e) = run_script(&script_line, &task.uuid, phase).await {
                hook.error = e.to_string();
            }
        }
    }

    // Re-import the sidecar so a pre-processing script can hand back a
    // modified task. This is the only mutation channel a hook has.
    if phase == HookPhase::Pre && hook.import_sidecar {
        if let Some(sidecar) = hook.sidecar_path.as_ref().filter(|s| !s.raw.is_empty()) {
            let contents = tokio::fs::read_to_string(&sidecar.resolved).await?;
            let imported: Task = serde_json::from_str(&contents)?;
            task.apply_sidecar(imported);
            debug!("re-imported sidecar file (uuid: {})", task.uuid);
        }
    }

    hook.finished_at = Utc::now().timestamp_millis();
    let failed = !hook.error.is_empty();
    let hook_error = hook.error.clone();
    task.set_hook(phase, hook);
    ctx.tasks.update_task(task).await;

    if failed {
        info!(
            "finished {}-processing with error (uuid: {})",
            phase, task.uuid
        );
        return Err(Error::Hook(hook_error));
    }
    info!("finished {}-processing (uuid: {})", phase, task.uuid);
    Ok(())
}

async fn write_sidecar(task: &Task, path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_string_pretty(task)?;
    tokio::fs::write(path, body).await?;
    Ok(())
}

async fn run_script(script_line: &str, uuid: &str, phase: HookPhase) -> Result<()> {
    let args = shell_words::split(script_line)
        .map_err(|e| Error::Hook(format!("failed to parse {}-processing script: {}", phase, e)))?;
    let Some((program, rest)) = args.split_first() else {
        return Err(Error::Hook(format!("empty {}-processing script", phase)));
    };

    debug!("triggered {}-processing script (uuid: {})", phase, uuid);
    let output = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::Hook(format!("failed to start {}-processing script: {}", phase, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Hook(format!(
            "{} (exit code: {})",
            stderr.trim_end(),
            output.status.code().unwrap_or(-1)
        )));
    }
    Ok(())
}
