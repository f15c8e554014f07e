//! Task queue: scheduler, workers and cancellation handles.

pub mod scheduler;
pub mod worker;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::EncoderLocator;
use crate::service::TaskService;

pub use scheduler::TaskScheduler;

/// Cancellation token paired with its recorded cause.
///
/// The cause distinguishes a user cancellation (`DONE_CANCELED`) from an
/// encoder failure (`DONE_ERROR`) when the supervisor returns an error.
#[derive(Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
    cause: Mutex<Option<String>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the cause and cancel the token.
    pub fn cancel(&self, cause: impl Into<String>) {
        *self.cause.lock() = Some(cause.into());
        self.token.cancel();
    }

    pub fn cause(&self) -> Option<String> {
        self.cause.lock().clone()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// Map of actively-worked task uuids to their cancellation handles.
///
/// An entry exists exactly while a worker owns the task.
pub type LiveSet = Arc<Mutex<HashMap<String, Arc<CancelHandle>>>>;

/// Removes a task's live-set entry when its worker exits, however it exits.
pub struct LiveSetGuard {
    live: LiveSet,
    uuid: String,
}

impl LiveSetGuard {
    pub fn new(live: LiveSet, uuid: impl Into<String>) -> Self {
        Self {
            live,
            uuid: uuid.into(),
        }
    }
}

impl Drop for LiveSetGuard {
    fn drop(&mut self) {
        self.live.lock().remove(&self.uuid);
    }
}

/// Shared dependencies handed to every worker.
pub struct WorkerContext {
    pub tasks: Arc<TaskService>,
    pub encoder: EncoderLocator,
}
