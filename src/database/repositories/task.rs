//! Task repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::database::models::{Pagination, TaskDbModel};
use crate::domain::TaskStatus;
use crate::{Error, Result};

/// Persistence operations the scheduler and the lifecycle façade require.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Oldest QUEUED task by `(priority DESC, created_at ASC)`, if any.
    async fn next_queued(&self) -> Result<Option<TaskDbModel>>;
    async fn create(&self, task: &TaskDbModel) -> Result<()>;
    /// Persist the full current row state atomically.
    async fn update(&self, task: &TaskDbModel) -> Result<()>;
    async fn first(&self, uuid: &str) -> Result<TaskDbModel>;
    /// Page of non-deleted tasks, newest first, with the total count.
    async fn list(&self, pagination: &Pagination) -> Result<(Vec<TaskDbModel>, u64)>;
    async fn soft_delete(&self, uuid: &str) -> Result<()>;
    async fn count_by_status(&self, status: TaskStatus) -> Result<u64>;
    async fn count_all_by_source(&self, source: &str) -> Result<u64>;
    async fn count_deleted(&self) -> Result<u64>;
    async fn count_deleted_by_status(&self, status: TaskStatus) -> Result<u64>;
}

/// SQLx implementation of [`TaskRepository`].
pub struct SqlxTaskRepository {
    pool: SqlitePool,
}

impl SqlxTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqlxTaskRepository {
    async fn next_queued(&self) -> Result<Option<TaskDbModel>> {
        let task = sqlx::query_as::<_, TaskDbModel>(
            "SELECT * FROM task WHERE status = 'QUEUED' AND deleted_at IS NULL \
             ORDER BY priority DESC, created_at ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    async fn create(&self, task: &TaskDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO task (
                uuid, status, source, input_file, output_file, command,
                pre_processing, post_processing, metadata,
                progress, remaining, started_at, finished_at, error, priority,
                created_at, updated_at, deleted_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.uuid)
        .bind(&task.status)
        .bind(&task.source)
        .bind(&task.input_file)
        .bind(&task.output_file)
        .bind(&task.command)
        .bind(&task.pre_processing)
        .bind(&task.post_processing)
        .bind(&task.metadata)
        .bind(task.progress)
        .bind(task.remaining)
        .bind(task.started_at)
        .bind(task.finished_at)
        .bind(&task.error)
        .bind(task.priority)
        .bind(&task.created_at)
        .bind(&task.updated_at)
        .bind(&task.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, task: &TaskDbModel) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE task SET
                status = ?, source = ?, input_file = ?, output_file = ?, command = ?,
                pre_processing = ?, post_processing = ?, metadata = ?,
                progress = ?, remaining = ?, started_at = ?, finished_at = ?,
                error = ?, priority = ?, updated_at = ?
            WHERE uuid = ?
            "#,
        )
        .bind(&task.status)
        .bind(&task.source)
        .bind(&task.input_file)
        .bind(&task.output_file)
        .bind(&task.command)
        .bind(&task.pre_processing)
        .bind(&task.post_processing)
        .bind(&task.metadata)
        .bind(task.progress)
        .bind(task.remaining)
        .bind(task.started_at)
        .bind(task.finished_at)
        .bind(&task.error)
        .bind(task.priority)
        .bind(Utc::now().to_rfc3339())
        .bind(&task.uuid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Task", &task.uuid));
        }
        Ok(())
    }

    async fn first(&self, uuid: &str) -> Result<TaskDbModel> {
        sqlx::query_as::<_, TaskDbModel>(
            "SELECT * FROM task WHERE uuid = ? AND deleted_at IS NULL",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("Task", uuid))
    }

    async fn list(&self, pagination: &Pagination) -> Result<(Vec<TaskDbModel>, u64)> {
        let tasks = sqlx::query_as::<_, TaskDbModel>(
            "SELECT * FROM task WHERE deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM task WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok((tasks, total.0 as u64))
    }

    async fn soft_delete(&self, uuid: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE task SET deleted_at = ?, updated_at = ? WHERE uuid = ? AND deleted_at IS NULL",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .bind(uuid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Task", uuid));
        }
        Ok(())
    }

    async fn count_by_status(&self, status: TaskStatus) -> Result<u64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM task WHERE status = ? AND deleted_at IS NULL",
        )
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0 as u64)
    }

    async fn count_all_by_source(&self, source: &str) -> Result<u64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM task WHERE source = ?")
            .bind(source)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 as u64)
    }

    async fn count_deleted(&self) -> Result<u64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM task WHERE deleted_at IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 as u64)
    }

    async fn count_deleted_by_status(&self, status: TaskStatus) -> Result<u64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM task WHERE status = ? AND deleted_at IS NOT NULL",
        )
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0 as u64)
    }
}
