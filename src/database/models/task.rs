//! Task row model and domain conversions.

use chrono::Utc;
use sqlx::FromRow;

use crate::domain::{Metadata, PrePostProcessing, RawResolved, Task, TaskStatus};

/// Task row. Structured fields are stored as JSON blobs; timestamps meant
/// for ordering are RFC3339 strings (lexicographic order matches time
/// order), task start/finish are millisecond epochs.
#[derive(Debug, Clone, FromRow)]
pub struct TaskDbModel {
    pub uuid: String,
    pub status: String,
    pub source: String,
    pub input_file: String,
    pub output_file: String,
    pub command: String,
    pub pre_processing: Option<String>,
    pub post_processing: Option<String>,
    pub metadata: Option<String>,
    pub progress: f64,
    pub remaining: f64,
    pub started_at: i64,
    pub finished_at: i64,
    pub error: String,
    pub priority: i32,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

fn raw_resolved_to_json(value: &RawResolved) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn raw_resolved_from_json(value: &str) -> RawResolved {
    serde_json::from_str(value).unwrap_or_default()
}

/// Convert a domain task into its row form.
pub fn task_to_db_model(task: &Task) -> TaskDbModel {
    TaskDbModel {
        uuid: task.uuid.clone(),
        status: task.status.as_str().to_string(),
        source: task.source.clone(),
        input_file: raw_resolved_to_json(&task.input_file),
        output_file: raw_resolved_to_json(&task.output_file),
        command: raw_resolved_to_json(&task.command),
        pre_processing: task
            .pre_processing
            .as_ref()
            .and_then(|h| serde_json::to_string(h).ok()),
        post_processing: task
            .post_processing
            .as_ref()
            .and_then(|h| serde_json::to_string(h).ok()),
        metadata: task
            .metadata
            .as_ref()
            .and_then(|m| serde_json::to_string(m).ok()),
        progress: task.progress,
        remaining: task.remaining,
        started_at: task.started_at,
        finished_at: task.finished_at,
        error: task.error.clone(),
        priority: task.priority,
        created_at: task.created_at.to_rfc3339(),
        updated_at: Utc::now().to_rfc3339(),
        deleted_at: None,
    }
}

/// Convert a row back into a domain task.
pub fn db_model_to_task(row: &TaskDbModel) -> Task {
    let created_at = chrono::DateTime::parse_from_rfc3339(&row.created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = chrono::DateTime::parse_from_rfc3339(&row.updated_at)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Task {
        uuid: row.uuid.clone(),
        status: TaskStatus::parse(&row.status).unwrap_or(TaskStatus::Queued),
        source: row.source.clone(),
        input_file: raw_resolved_from_json(&row.input_file),
        output_file: raw_resolved_from_json(&row.output_file),
        command: raw_resolved_from_json(&row.command),
        pre_processing: row
            .pre_processing
            .as_ref()
            .and_then(|s| serde_json::from_str::<PrePostProcessing>(s).ok()),
        post_processing: row
            .post_processing
            .as_ref()
            .and_then(|s| serde_json::from_str::<PrePostProcessing>(s).ok()),
        metadata: row
            .metadata
            .as_ref()
            .and_then(|s| serde_json::from_str::<Metadata>(s).ok()),
        progress: row.progress,
        remaining: row.remaining,
        started_at: row.started_at,
        finished_at: row.finished_at,
        error: row.error.clone(),
        priority: row.priority,
        created_at,
        updated_at,
    }
}
