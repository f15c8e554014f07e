//! Task scheduler: dispatch loop, cancel loop and the live set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::{worker, CancelHandle, LiveSet, LiveSetGuard, WorkerContext};
use crate::database::models::task::db_model_to_task;
use crate::database::repositories::TaskRepository;
use crate::service::task::CANCEL_CAUSE;

/// Interval between queue polls.
const DISPATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Pulls queued tasks out of the repository and runs them on bounded
/// concurrent workers, each owning a cancellation handle in the live set.
pub struct TaskScheduler {
    max_concurrent_tasks: usize,
    live: LiveSet,
    ctx: Arc<WorkerContext>,
    shutdown: CancellationToken,
}

impl TaskScheduler {
    pub fn new(
        max_concurrent_tasks: usize,
        ctx: WorkerContext,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            max_concurrent_tasks,
            live: Arc::new(Mutex::new(HashMap::new())),
            ctx: Arc::new(ctx),
            shutdown,
        }
    }

    /// Spawn the dispatch and cancel loops.
    pub fn start(&self, cancel_rx: mpsc::UnboundedReceiver<String>) {
        self.spawn_dispatch_loop();
        self.spawn_cancel_loop(cancel_rx);
    }

    fn spawn_dispatch_loop(&self) {
        let max = self.max_concurrent_tasks;
        let live = self.live.clone();
        let ctx = self.ctx.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(DISPATCH_INTERVAL);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tick.tick() => {}
                }

                // The dispatch loop is the only inserter, so checking the
                // count before the dequeue preserves the cap.
                let live_count = live.lock().len();
                if live_count >= max {
                    debug!(
                        "maximum concurrent tasks reached (tasks: {}/{})",
                        live_count, max
                    );
                    continue;
                }

                match ctx.tasks.repository().next_queued().await {
                    Err(e) => error!("failed to receive queued task from db: {}", e),
                    Ok(None) => debug!("no queued tasks found"),
                    Ok(Some(row)) => {
                        let task = db_model_to_task(&row);
                        let handle = Arc::new(CancelHandle::new());
                        live.lock().insert(task.uuid.clone(), handle.clone());
                        let guard = LiveSetGuard::new(live.clone(), task.uuid.clone());
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            worker::process_task(ctx, task, handle, guard).await;
                        });
                    }
                }
            }
        });
    }

    fn spawn_cancel_loop(&self, mut cancel_rx: mpsc::UnboundedReceiver<String>) {
        let live = self.live.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    uuid = cancel_rx.recv() => match uuid {
                        Some(uuid) => {
                            let handle = live.lock().get(&uuid).cloned();
                            match handle {
                                Some(handle) => handle.cancel(CANCEL_CAUSE),
                                // The task may have completed in the meantime.
                                None => warn!("task not found to cancel (uuid: {})", uuid),
                            }
                        }
                        None => break,
                    }
                }
            }
        });
    }
}
