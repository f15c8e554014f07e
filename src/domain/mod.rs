//! Domain types: tasks, webhooks, presets.

pub mod preset;
pub mod task;
pub mod webhook;

pub use preset::{NewPreset, Preset};
pub use task::{
    Metadata, NewHook, NewTask, PrePostProcessing, RawResolved, Task, TaskStatus,
};
pub use webhook::{NewWebhook, Webhook, WebhookEvent};
