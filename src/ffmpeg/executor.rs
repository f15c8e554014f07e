//! Encoder execution: command splitting, child supervision, cancellation.

use std::collections::VecDeque;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::progress::{ProgressParser, ProgressUpdate};
use crate::{Error, Result};

/// How long a canceled child gets to quit gracefully before being killed.
const KILL_GRACE: Duration = Duration::from_secs(3);

/// How many trailing stderr lines are kept for the failure message.
const STDERR_RING_LINES: usize = 100;

/// One encoder invocation.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub task_uuid: String,
    /// Fully resolved command string; may contain `&&` sub-commands.
    pub command: String,
    /// Resolved encoder binary path for the first sub-command.
    pub encoder: String,
    pub cancel: CancellationToken,
}

/// Run the encoder for every `&&`-separated sub-command in order.
///
/// Progress observations are delivered through `progress_tx` with `try_send`;
/// a slow consumer drops frames rather than stalling the supervisor. Task
/// state is never touched here.
pub async fn execute(
    request: &ExecutionRequest,
    progress_tx: mpsc::Sender<ProgressUpdate>,
) -> Result<()> {
    for (index, sub_command) in request.command.split("&&").enumerate() {
        run_sub_command(request, index, sub_command.trim(), &progress_tx).await?;
    }
    Ok(())
}

async fn run_sub_command(
    request: &ExecutionRequest,
    index: usize,
    sub_command: &str,
    progress_tx: &mpsc::Sender<ProgressUpdate>,
) -> Result<()> {
    let mut args = shell_words::split(sub_command)
        .map_err(|e| Error::spawn(format!("failed to parse command: {}", e)))?;
    args.push("-progress".to_string());
    args.push("pipe:2".to_string());

    // The first sub-command runs the configured encoder; subsequent ones name
    // their own program in the first token.
    let (program, args) = if index == 0 {
        (request.encoder.clone(), args)
    } else {
        if args.len() <= 2 {
            return Err(Error::spawn(format!(
                "empty sub-command at position {}",
                index + 1
            )));
        }
        (args[0].clone(), args[1..].to_vec())
    };

    let mut child = Command::new(&program)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::spawn(format!("failed to start encoder: {}", e)))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::spawn("failed to open encoder stderr pipe"))?;
    let mut stdin = child.stdin.take();

    let mut lines = BufReader::new(stderr).lines();
    let mut stderr_ring: VecDeque<String> = VecDeque::with_capacity(STDERR_RING_LINES);
    let mut parser = ProgressParser::new();
    let mut canceled = false;

    loop {
        tokio::select! {
            _ = request.cancel.cancelled() => {
                canceled = true;
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if stderr_ring.len() == STDERR_RING_LINES {
                        stderr_ring.pop_front();
                    }
                    stderr_ring.push_back(line.clone());
                    if let Some(update) = parser.observe_line(&line) {
                        debug!(
                            uuid = %request.task_uuid,
                            percent = update.percent,
                            remaining = update.remaining,
                            "encoder progress"
                        );
                        let _ = progress_tx.try_send(update);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(uuid = %request.task_uuid, "error reading encoder stderr: {}", e);
                    break;
                }
            }
        }
    }

    if canceled {
        // Ask the encoder to quit gracefully, then force-kill after the
        // grace window.
        if let Some(mut sin) = stdin.take() {
            let _ = sin.write_all(b"q\n").await;
            let _ = sin.shutdown().await;
        }
        if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        return Err(Error::Canceled("encoder terminated by cancellation".to_string()));
    }

    drop(stdin);
    let status = child.wait().await?;
    if !status.success() {
        let stderr: Vec<String> = stderr_ring.into_iter().collect();
        return Err(Error::EncoderExit(stderr.join("\n")));
    }
    Ok(())
}
