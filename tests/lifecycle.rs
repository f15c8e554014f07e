//! End-to-end lifecycle tests: scheduler, workers and the façade running
//! against a file-backed SQLite database with `/bin/sh` standing in for the
//! encoder.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use ffqueue::config::EncoderLocator;
use ffqueue::database::repositories::TaskRepository;
use ffqueue::database::{self, repositories::SqlxTaskRepository};
use ffqueue::domain::{NewHook, NewTask, Task, TaskStatus, WebhookEvent};
use ffqueue::events::EventBus;
use ffqueue::queue::{TaskScheduler, WorkerContext};
use ffqueue::service::TaskService;

struct Harness {
    dir: TempDir,
    tasks: Arc<TaskService>,
    shutdown: CancellationToken,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn harness(max_concurrent_tasks: usize) -> Harness {
    let dir = TempDir::new().unwrap();
    let database_url = format!(
        "sqlite:{}?mode=rwc",
        dir.path().join("ffqueue.db").display()
    );
    let pool = database::init_pool(&database_url).await.unwrap();
    database::run_migrations(&pool).await.unwrap();

    let repository = Arc::new(SqlxTaskRepository::new(pool));
    let bus = EventBus::new();
    let (cancel_tx, cancel_rx) = mpsc::unbounded_channel();
    let tasks = Arc::new(TaskService::new(repository, bus, cancel_tx));

    let shutdown = CancellationToken::new();
    let scheduler = TaskScheduler::new(
        max_concurrent_tasks,
        WorkerContext {
            tasks: tasks.clone(),
            encoder: EncoderLocator::new(Some("/bin/sh".to_string())),
        },
        shutdown.clone(),
    );
    scheduler.start(cancel_rx);

    Harness {
        dir,
        tasks,
        shutdown,
    }
}

async fn wait_for_status(
    tasks: &TaskService,
    uuid: &str,
    expected: TaskStatus,
    timeout: Duration,
) -> Task {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let task = tasks.get(uuid).await.unwrap();
        if task.status == expected {
            return task;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}, last status {} (error: {})",
            expected,
            task.status,
            task.error
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn sh_task(script: &str, output_file: &str) -> NewTask {
    NewTask {
        command: format!("-c '{}'", script),
        input_file: "/in/a.mp4".to_string(),
        output_file: output_file.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_single_successful_task() {
    let harness = harness(2).await;
    let output_file = harness.dir.path().join("out/a.mkv");

    let mut events = harness.tasks.bus().subscribe();

    // The fake encoder emits one progress frame at 50%.
    let script = "printf \"Duration: 00:00:02.00\\nout_time_ms=1000000\\nspeed=1x\\nprogress=continue\\n\" >&2; exit 0";
    let task = harness
        .tasks
        .create(sh_task(script, &output_file.to_string_lossy()), "api")
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Queued);

    let done = wait_for_status(
        &harness.tasks,
        &task.uuid,
        TaskStatus::DoneSuccessful,
        Duration::from_secs(10),
    )
    .await;

    assert_eq!(done.error, "");
    assert_eq!(done.progress, 100.0);
    assert_eq!(done.remaining, -1.0);
    assert!(done.started_at > 0);
    assert!(done.finished_at >= done.started_at);
    // The worker created the output file's parent directory.
    assert!(output_file.parent().unwrap().is_dir());

    // At least one RUNNING update carried a mid-flight progress value.
    let mut saw_created = false;
    let mut saw_midflight_progress = false;
    while let Ok(event) = events.try_recv() {
        match event.event {
            WebhookEvent::TaskCreated => saw_created = true,
            WebhookEvent::TaskUpdated => {
                let progress = event.payload["progress"].as_f64().unwrap_or(0.0);
                if progress > 0.0 && progress < 100.0 {
                    saw_midflight_progress = true;
                }
            }
            _ => {}
        }
    }
    assert!(saw_created);
    assert!(saw_midflight_progress);
}

#[tokio::test]
async fn test_cancellation_of_running_task() {
    let harness = harness(2).await;

    let task = harness
        .tasks
        .create(sh_task("sleep 30", ""), "api")
        .await
        .unwrap();

    wait_for_status(
        &harness.tasks,
        &task.uuid,
        TaskStatus::Running,
        Duration::from_secs(10),
    )
    .await;

    harness.tasks.cancel(&task.uuid).await.unwrap();

    let canceled = wait_for_status(
        &harness.tasks,
        &task.uuid,
        TaskStatus::DoneCanceled,
        Duration::from_secs(15),
    )
    .await;
    assert_eq!(canceled.error, "task canceled by user");
    assert_eq!(canceled.progress, 100.0);

    // The slot is free again: the next task runs to completion.
    let follow_up = harness
        .tasks
        .create(sh_task("exit 0", ""), "api")
        .await
        .unwrap();
    wait_for_status(
        &harness.tasks,
        &follow_up.uuid,
        TaskStatus::DoneSuccessful,
        Duration::from_secs(10),
    )
    .await;
}

#[tokio::test]
async fn test_concurrency_cap_is_never_exceeded() {
    let harness = harness(1).await;

    let mut uuids = Vec::new();
    for _ in 0..3 {
        let task = harness
            .tasks
            .create(sh_task("sleep 1", ""), "api")
            .await
            .unwrap();
        uuids.push(task.uuid);
    }

    let repository = harness.tasks.repository();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        let active = repository
            .count_by_status(TaskStatus::PreProcessing)
            .await
            .unwrap()
            + repository
                .count_by_status(TaskStatus::Running)
                .await
                .unwrap()
            + repository
                .count_by_status(TaskStatus::PostProcessing)
                .await
                .unwrap();
        assert!(active <= 1, "concurrency cap exceeded: {} active", active);

        let done = repository
            .count_by_status(TaskStatus::DoneSuccessful)
            .await
            .unwrap();
        if done == 3 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "tasks did not finish in time ({} done)",
            done
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_post_hook_failure_fails_the_task() {
    let harness = harness(2).await;

    let script = harness.dir.path().join("post.sh");
    std::fs::write(&script, "#!/bin/sh\necho postfail >&2\nexit 5\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut new_task = sh_task("exit 0", "");
    new_task.post_processing = Some(NewHook {
        script_path: Some(script.to_string_lossy().into_owned()),
        ..Default::default()
    });

    let task = harness.tasks.create(new_task, "api").await.unwrap();
    let failed = wait_for_status(
        &harness.tasks,
        &task.uuid,
        TaskStatus::DoneError,
        Duration::from_secs(10),
    )
    .await;

    assert!(failed.error.contains("postfail"));
    assert!(failed.error.contains("exit code: 5"));
    assert_eq!(failed.progress, 100.0);
}

#[tokio::test]
async fn test_queued_task_cancels_without_scheduler() {
    let harness = harness(1).await;

    // Occupy the single slot so the second task stays queued.
    let blocker = harness
        .tasks
        .create(sh_task("sleep 10", ""), "api")
        .await
        .unwrap();
    wait_for_status(
        &harness.tasks,
        &blocker.uuid,
        TaskStatus::Running,
        Duration::from_secs(10),
    )
    .await;

    let queued = harness
        .tasks
        .create(sh_task("exit 0", ""), "api")
        .await
        .unwrap();
    let canceled = harness.tasks.cancel(&queued.uuid).await.unwrap();
    assert_eq!(canceled.status, TaskStatus::DoneCanceled);
    assert_eq!(canceled.error, "task canceled by user");

    harness.tasks.cancel(&blocker.uuid).await.unwrap();
    wait_for_status(
        &harness.tasks,
        &blocker.uuid,
        TaskStatus::DoneCanceled,
        Duration::from_secs(15),
    )
    .await;
}

#[tokio::test]
async fn test_pre_hook_sidecar_feeds_the_encoder() {
    let harness = harness(2).await;
    let sidecar = harness.dir.path().join("sidecar/task.json");
    let marker = harness.dir.path().join("marker");

    // The encoder run proves the pre phase completed first.
    let mut new_task = sh_task(&format!("touch {}", marker.display()), "");
    new_task.pre_processing = Some(NewHook {
        sidecar_path: Some(sidecar.to_string_lossy().into_owned()),
        ..Default::default()
    });

    let task = harness.tasks.create(new_task, "api").await.unwrap();
    wait_for_status(
        &harness.tasks,
        &task.uuid,
        TaskStatus::DoneSuccessful,
        Duration::from_secs(10),
    )
    .await;

    assert!(marker.exists());
    let written: Task =
        serde_json::from_str(&std::fs::read_to_string(&sidecar).unwrap()).unwrap();
    assert_eq!(written.uuid, task.uuid);
    assert_eq!(written.status, TaskStatus::PreProcessing);
}
