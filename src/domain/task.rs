//! Task domain model and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered mapping of task metadata, preserved as supplied by the client.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Queued,
    PreProcessing,
    Running,
    PostProcessing,
    DoneSuccessful,
    DoneError,
    DoneCanceled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::PreProcessing => "PRE_PROCESSING",
            Self::Running => "RUNNING",
            Self::PostProcessing => "POST_PROCESSING",
            Self::DoneSuccessful => "DONE_SUCCESSFUL",
            Self::DoneError => "DONE_ERROR",
            Self::DoneCanceled => "DONE_CANCELED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUEUED" => Some(Self::Queued),
            "PRE_PROCESSING" => Some(Self::PreProcessing),
            "RUNNING" => Some(Self::Running),
            "POST_PROCESSING" => Some(Self::PostProcessing),
            "DONE_SUCCESSFUL" => Some(Self::DoneSuccessful),
            "DONE_ERROR" => Some(Self::DoneError),
            "DONE_CANCELED" => Some(Self::DoneCanceled),
            _ => None,
        }
    }

    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::DoneSuccessful | Self::DoneError | Self::DoneCanceled
        )
    }

    /// Whether `self -> to` is a valid edge in the lifecycle DAG.
    pub fn can_transition(&self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (self, to) {
            (Queued, PreProcessing) | (Queued, Running) => true,
            (PreProcessing, Running) => true,
            (Running, PostProcessing) | (Running, DoneSuccessful) => true,
            (PostProcessing, DoneSuccessful) => true,
            (_, DoneError) | (_, DoneCanceled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A template string together with its materialized form.
///
/// `resolved` is populated when the scheduler picks the task up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResolved {
    pub raw: String,
    #[serde(default)]
    pub resolved: String,
}

impl RawResolved {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            resolved: String::new(),
        }
    }
}

/// Pre- or post-processing hook attached to a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrePostProcessing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_path: Option<RawResolved>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidecar_path: Option<RawResolved>,
    #[serde(default)]
    pub import_sidecar: bool,
    #[serde(default)]
    pub started_at: i64,
    #[serde(default)]
    pub finished_at: i64,
    #[serde(default)]
    pub error: String,
}

impl PrePostProcessing {
    /// A hook with neither script nor sidecar is skipped entirely.
    pub fn is_empty(&self) -> bool {
        self.script_path.is_none() && self.sidecar_path.is_none()
    }
}

/// One media-conversion task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub uuid: String,
    pub status: TaskStatus,
    pub source: String,
    pub input_file: RawResolved,
    pub output_file: RawResolved,
    pub command: RawResolved,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_processing: Option<PrePostProcessing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_processing: Option<PrePostProcessing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub progress: f64,
    /// ETA in seconds, -1 when unknown or terminal.
    pub remaining: f64,
    /// Millisecond epoch, 0 when unset.
    pub started_at: i64,
    pub finished_at: i64,
    pub error: String,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a fresh QUEUED task from a client submission.
    pub fn from_new(new: NewTask, source: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            status: TaskStatus::Queued,
            source: source.into(),
            input_file: RawResolved::new(new.input_file),
            output_file: RawResolved::new(new.output_file),
            command: RawResolved::new(new.command),
            pre_processing: new.pre_processing.map(NewHook::into_hook),
            post_processing: new.post_processing.map(NewHook::into_hook),
            metadata: new.metadata,
            progress: 0.0,
            remaining: -1.0,
            started_at: 0,
            finished_at: 0,
            error: String::new(),
            priority: new.priority.unwrap_or(0),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn hook(&self, phase: crate::hooks::HookPhase) -> Option<&PrePostProcessing> {
        match phase {
            crate::hooks::HookPhase::Pre => self.pre_processing.as_ref(),
            crate::hooks::HookPhase::Post => self.post_processing.as_ref(),
        }
    }

    pub fn set_hook(&mut self, phase: crate::hooks::HookPhase, hook: PrePostProcessing) {
        match phase {
            crate::hooks::HookPhase::Pre => self.pre_processing = Some(hook),
            crate::hooks::HookPhase::Post => self.post_processing = Some(hook),
        }
    }

    /// Apply a sidecar re-import onto the live task.
    ///
    /// Only template inputs may be rewritten by a pre-processing script;
    /// identity, status, progress and timestamps are never taken from the
    /// sidecar.
    pub fn apply_sidecar(&mut self, imported: Task) {
        self.command.raw = imported.command.raw;
        self.input_file.raw = imported.input_file.raw;
        self.output_file.raw = imported.output_file.raw;
        self.metadata = imported.metadata;
        self.priority = imported.priority;
        self.post_processing = imported.post_processing;
    }
}

/// Hook definition as submitted by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHook {
    #[serde(default)]
    pub script_path: Option<String>,
    #[serde(default)]
    pub sidecar_path: Option<String>,
    #[serde(default)]
    pub import_sidecar: bool,
}

impl NewHook {
    fn into_hook(self) -> PrePostProcessing {
        PrePostProcessing {
            script_path: self.script_path.filter(|s| !s.is_empty()).map(RawResolved::new),
            sidecar_path: self
                .sidecar_path
                .filter(|s| !s.is_empty())
                .map(RawResolved::new),
            import_sidecar: self.import_sidecar,
            ..Default::default()
        }
    }
}

/// Task submission payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub command: String,
    #[serde(default)]
    pub input_file: String,
    #[serde(default)]
    pub output_file: String,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub pre_processing: Option<NewHook>,
    #[serde(default)]
    pub post_processing: Option<NewHook>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            TaskStatus::Queued,
            TaskStatus::PreProcessing,
            TaskStatus::Running,
            TaskStatus::PostProcessing,
            TaskStatus::DoneSuccessful,
            TaskStatus::DoneError,
            TaskStatus::DoneCanceled,
        ] {
            assert_eq!(TaskStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(TaskStatus::parse("BOGUS"), None);
    }

    #[test]
    fn test_status_serde_strings() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::DoneSuccessful).unwrap(),
            "\"DONE_SUCCESSFUL\""
        );
        let s: TaskStatus = serde_json::from_str("\"PRE_PROCESSING\"").unwrap();
        assert_eq!(s, TaskStatus::PreProcessing);
    }

    #[test]
    fn test_transition_dag() {
        use TaskStatus::*;
        assert!(Queued.can_transition(PreProcessing));
        assert!(Queued.can_transition(Running));
        assert!(PreProcessing.can_transition(Running));
        assert!(Running.can_transition(PostProcessing));
        assert!(Running.can_transition(DoneSuccessful));
        assert!(PostProcessing.can_transition(DoneSuccessful));
        // Any non-terminal state may fail or be canceled.
        for s in [Queued, PreProcessing, Running, PostProcessing] {
            assert!(s.can_transition(DoneError));
            assert!(s.can_transition(DoneCanceled));
        }
        // Terminal states never move again.
        for s in [DoneSuccessful, DoneError, DoneCanceled] {
            assert!(!s.can_transition(Queued));
            assert!(!s.can_transition(DoneError));
        }
        // No skipping backwards.
        assert!(!Running.can_transition(Queued));
        assert!(!PostProcessing.can_transition(Running));
    }

    #[test]
    fn test_task_from_new() {
        let task = Task::from_new(
            NewTask {
                command: "-i ${INPUT_FILE} ${OUTPUT_FILE}".to_string(),
                input_file: "/in/a.mp4".to_string(),
                output_file: "/out/a.mkv".to_string(),
                priority: Some(5),
                ..Default::default()
            },
            "api",
        );
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.source, "api");
        assert_eq!(task.priority, 5);
        assert_eq!(task.progress, 0.0);
        assert_eq!(task.remaining, -1.0);
        assert!(task.input_file.resolved.is_empty());
        assert!(!task.uuid.is_empty());
    }

    #[test]
    fn test_task_serde_camel_case() {
        let task = Task::from_new(
            NewTask {
                command: "-i a b".to_string(),
                input_file: "a".to_string(),
                output_file: "b".to_string(),
                ..Default::default()
            },
            "api",
        );
        let json = serde_json::to_value(&task).unwrap();
        assert!(json.get("inputFile").is_some());
        assert!(json.get("outputFile").is_some());
        assert!(json.get("startedAt").is_some());
        assert!(json.get("input_file").is_none());
    }

    #[test]
    fn test_apply_sidecar_whitelist() {
        let mut task = Task::from_new(
            NewTask {
                command: "-i x y".to_string(),
                input_file: "x".to_string(),
                output_file: "y".to_string(),
                ..Default::default()
            },
            "api",
        );
        task.status = TaskStatus::PreProcessing;
        let original_uuid = task.uuid.clone();

        let mut forged = task.clone();
        forged.uuid = "forged-uuid".to_string();
        forged.status = TaskStatus::DoneSuccessful;
        forged.progress = 100.0;
        forged.command.raw = "-i x z".to_string();
        forged.priority = 9;

        task.apply_sidecar(forged);
        assert_eq!(task.uuid, original_uuid);
        assert_eq!(task.status, TaskStatus::PreProcessing);
        assert_eq!(task.progress, 0.0);
        assert_eq!(task.command.raw, "-i x z");
        assert_eq!(task.priority, 9);
    }

    #[test]
    fn test_empty_hook_is_skipped() {
        assert!(PrePostProcessing::default().is_empty());
        let hook = PrePostProcessing {
            script_path: Some(RawResolved::new("/bin/true")),
            ..Default::default()
        };
        assert!(!hook.is_empty());
    }
}
