//! Repository traits and their sqlx implementations.

pub mod preset;
pub mod task;
pub mod webhook;

pub use preset::{PresetRepository, SqlxPresetRepository};
pub use task::{SqlxTaskRepository, TaskRepository};
pub use webhook::{SqlxWebhookRepository, WebhookRepository};
