//! Preset domain model: reusable task templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::NewHook;

/// A reusable task template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub uuid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_processing: Option<NewHook>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_processing: Option<NewHook>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Preset {
    pub fn from_new(new: NewPreset) -> Self {
        let now = Utc::now();
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            command: new.command,
            output_file: new.output_file,
            priority: new.priority.unwrap_or(0),
            pre_processing: new.pre_processing,
            post_processing: new.post_processing,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Preset creation/update payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPreset {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub command: String,
    #[serde(default)]
    pub output_file: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub pre_processing: Option<NewHook>,
    #[serde(default)]
    pub post_processing: Option<NewHook>,
}
