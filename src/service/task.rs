//! Task lifecycle façade.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::database::models::task::{db_model_to_task, task_to_db_model};
use crate::database::models::Pagination;
use crate::database::repositories::TaskRepository;
use crate::domain::{NewTask, Task, TaskStatus, WebhookEvent};
use crate::events::EventBus;
use crate::{Error, Result};

/// Error message recorded on user-canceled tasks.
pub const CANCEL_CAUSE: &str = "task canceled by user";

/// Translates create/cancel/delete requests into repository writes and
/// cancellation signals, and emits every task event.
pub struct TaskService {
    repository: Arc<dyn TaskRepository>,
    bus: EventBus,
    cancel_tx: mpsc::UnboundedSender<String>,
}

impl TaskService {
    pub fn new(
        repository: Arc<dyn TaskRepository>,
        bus: EventBus,
        cancel_tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            repository,
            bus,
            cancel_tx,
        }
    }

    pub fn repository(&self) -> &Arc<dyn TaskRepository> {
        &self.repository
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Persist a new QUEUED task and announce it.
    pub async fn create(&self, new: NewTask, source: &str) -> Result<Task> {
        if new.command.trim().is_empty() {
            return Err(Error::validation("command must not be empty"));
        }

        let task = Task::from_new(new, source);
        self.repository.create(&task_to_db_model(&task)).await?;
        info!("created task (uuid: {})", task.uuid);
        self.bus.emit(WebhookEvent::TaskCreated, &task);
        Ok(task)
    }

    pub async fn get(&self, uuid: &str) -> Result<Task> {
        let row = self.repository.first(uuid).await?;
        Ok(db_model_to_task(&row))
    }

    pub async fn list(&self, pagination: &Pagination) -> Result<(Vec<Task>, u64)> {
        let (rows, total) = self.repository.list(pagination).await?;
        Ok((rows.iter().map(db_model_to_task).collect(), total))
    }

    /// Cancel a task.
    ///
    /// A task still in the queue is transitioned directly; an actively-worked
    /// task is routed to the scheduler's cancel loop. Terminal tasks cannot
    /// be canceled.
    pub async fn cancel(&self, uuid: &str) -> Result<Task> {
        let mut task = self.get(uuid).await?;

        match task.status {
            TaskStatus::Queued => {
                task.status = TaskStatus::DoneCanceled;
                task.error = CANCEL_CAUSE.to_string();
                task.progress = 100.0;
                task.remaining = -1.0;
                task.finished_at = Utc::now().timestamp_millis();
                self.repository.update(&task_to_db_model(&task)).await?;
                warn!("task canceled while queued (uuid: {})", task.uuid);
                self.bus.emit(WebhookEvent::TaskUpdated, &task);
                Ok(task)
            }
            status if status.is_terminal() => Err(Error::InvalidStateTransition {
                from: status.as_str().to_string(),
                to: TaskStatus::DoneCanceled.as_str().to_string(),
            }),
            _ => {
                self.cancel_tx
                    .send(uuid.to_string())
                    .map_err(|_| Error::Other("scheduler cancel loop is gone".to_string()))?;
                Ok(task)
            }
        }
    }

    /// Soft-delete a task, canceling it first when still in flight.
    pub async fn delete(&self, uuid: &str) -> Result<()> {
        let task = self.get(uuid).await?;
        if !task.status.is_terminal() {
            // Best effort; the row disappears either way.
            let _ = self.cancel(uuid).await;
        }
        self.repository.soft_delete(uuid).await?;
        info!("deleted task (uuid: {})", uuid);
        self.bus.emit(WebhookEvent::TaskDeleted, &task);
        Ok(())
    }

    /// Persist worker-side task state and announce the update.
    ///
    /// Repository failures here are logged and swallowed: the worker keeps
    /// going on best-effort durability.
    pub async fn update_task(&self, task: &Task) {
        if let Err(e) = self.repository.update(&task_to_db_model(task)).await {
            warn!("failed to persist task update (uuid: {}): {}", task.uuid, e);
        }
        self.bus.emit(WebhookEvent::TaskUpdated, task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::SqlxTaskRepository;
    use crate::database::{init_pool, run_migrations};

    async fn service() -> (TaskService, mpsc::UnboundedReceiver<String>) {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let (cancel_tx, cancel_rx) = mpsc::unbounded_channel();
        (
            TaskService::new(
                Arc::new(SqlxTaskRepository::new(pool)),
                EventBus::new(),
                cancel_tx,
            ),
            cancel_rx,
        )
    }

    fn new_task() -> NewTask {
        NewTask {
            command: "-i ${INPUT_FILE} ${OUTPUT_FILE}".to_string(),
            input_file: "/in/a.mp4".to_string(),
            output_file: "/out/a.mkv".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_emits_event_and_persists() {
        let (service, _rx) = service().await;
        let mut events = service.bus().subscribe();

        let task = service.create(new_task(), "api").await.unwrap();
        assert_eq!(task.status, TaskStatus::Queued);

        let event = events.try_recv().unwrap();
        assert_eq!(event.event, WebhookEvent::TaskCreated);
        assert_eq!(event.payload["uuid"], serde_json::json!(task.uuid));

        let fetched = service.get(&task.uuid).await.unwrap();
        assert_eq!(fetched.uuid, task.uuid);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_command() {
        let (service, _rx) = service().await;
        let result = service
            .create(
                NewTask {
                    command: "  ".to_string(),
                    ..Default::default()
                },
                "api",
            )
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_cancel_queued_transitions_directly() {
        let (service, mut cancel_rx) = service().await;
        let task = service.create(new_task(), "api").await.unwrap();

        let canceled = service.cancel(&task.uuid).await.unwrap();
        assert_eq!(canceled.status, TaskStatus::DoneCanceled);
        assert_eq!(canceled.error, CANCEL_CAUSE);
        assert_eq!(canceled.progress, 100.0);
        assert!(canceled.finished_at > 0);
        // Nothing was routed to the cancel loop.
        assert!(cancel_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancel_running_routes_to_cancel_loop() {
        let (service, mut cancel_rx) = service().await;
        let task = service.create(new_task(), "api").await.unwrap();

        let mut running = task.clone();
        running.status = TaskStatus::Running;
        service.update_task(&running).await;

        service.cancel(&task.uuid).await.unwrap();
        assert_eq!(cancel_rx.try_recv().unwrap(), task.uuid);
    }

    #[tokio::test]
    async fn test_cancel_terminal_is_invalid() {
        let (service, _rx) = service().await;
        let task = service.create(new_task(), "api").await.unwrap();

        let mut done = task.clone();
        done.status = TaskStatus::DoneSuccessful;
        done.progress = 100.0;
        service.update_task(&done).await;

        assert!(matches!(
            service.cancel(&task.uuid).await,
            Err(Error::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_soft_deletes_and_emits() {
        let (service, _rx) = service().await;
        let task = service.create(new_task(), "api").await.unwrap();

        let mut events = service.bus().subscribe();
        service.delete(&task.uuid).await.unwrap();

        assert!(matches!(
            service.get(&task.uuid).await,
            Err(Error::NotFound { .. })
        ));
        // Queued task is canceled first (task.updated), then deleted.
        let first = events.try_recv().unwrap();
        assert_eq!(first.event, WebhookEvent::TaskUpdated);
        let second = events.try_recv().unwrap();
        assert_eq!(second.event, WebhookEvent::TaskDeleted);
    }
}
