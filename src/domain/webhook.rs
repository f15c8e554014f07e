//! Webhook domain model and event kinds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle events observable through webhooks and the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEvent {
    #[serde(rename = "task.created")]
    TaskCreated,
    #[serde(rename = "task.updated")]
    TaskUpdated,
    #[serde(rename = "task.deleted")]
    TaskDeleted,
    #[serde(rename = "webhook.created")]
    WebhookCreated,
    #[serde(rename = "webhook.updated")]
    WebhookUpdated,
    #[serde(rename = "webhook.deleted")]
    WebhookDeleted,
    #[serde(rename = "preset.created")]
    PresetCreated,
    #[serde(rename = "preset.updated")]
    PresetUpdated,
    #[serde(rename = "preset.deleted")]
    PresetDeleted,
    #[serde(rename = "watchfolder.created")]
    WatchfolderCreated,
    #[serde(rename = "watchfolder.updated")]
    WatchfolderUpdated,
    #[serde(rename = "watchfolder.deleted")]
    WatchfolderDeleted,
}

impl WebhookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskCreated => "task.created",
            Self::TaskUpdated => "task.updated",
            Self::TaskDeleted => "task.deleted",
            Self::WebhookCreated => "webhook.created",
            Self::WebhookUpdated => "webhook.updated",
            Self::WebhookDeleted => "webhook.deleted",
            Self::PresetCreated => "preset.created",
            Self::PresetUpdated => "preset.updated",
            Self::PresetDeleted => "preset.deleted",
            Self::WatchfolderCreated => "watchfolder.created",
            Self::WatchfolderUpdated => "watchfolder.updated",
            Self::WatchfolderDeleted => "watchfolder.deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "task.created" => Some(Self::TaskCreated),
            "task.updated" => Some(Self::TaskUpdated),
            "task.deleted" => Some(Self::TaskDeleted),
            "webhook.created" => Some(Self::WebhookCreated),
            "webhook.updated" => Some(Self::WebhookUpdated),
            "webhook.deleted" => Some(Self::WebhookDeleted),
            "preset.created" => Some(Self::PresetCreated),
            "preset.updated" => Some(Self::PresetUpdated),
            "preset.deleted" => Some(Self::PresetDeleted),
            "watchfolder.created" => Some(Self::WatchfolderCreated),
            "watchfolder.updated" => Some(Self::WatchfolderUpdated),
            "watchfolder.deleted" => Some(Self::WatchfolderDeleted),
        _ => None,
        }
    }

    /// Frame type on the push channel (`task.updated` -> `task:updated`).
    pub fn push_type(&self) -> String {
        self.as_str().replace('.', ":")
    }
}

impl std::fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered webhook subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub uuid: String,
    pub event: WebhookEvent,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Webhook {
    pub fn from_new(new: NewWebhook) -> Self {
        let now = Utc::now();
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            event: new.event,
            url: new.url,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Webhook registration payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWebhook {
    pub event: WebhookEvent,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_round_trip() {
        for e in [
            WebhookEvent::TaskCreated,
            WebhookEvent::TaskUpdated,
            WebhookEvent::TaskDeleted,
            WebhookEvent::WebhookCreated,
            WebhookEvent::PresetDeleted,
            WebhookEvent::WatchfolderUpdated,
        ] {
            assert_eq!(WebhookEvent::parse(e.as_str()), Some(e));
        }
    }

    #[test]
    fn test_event_serde_uses_dotted_names() {
        assert_eq!(
            serde_json::to_string(&WebhookEvent::TaskUpdated).unwrap(),
            "\"task.updated\""
        );
        let e: WebhookEvent = serde_json::from_str("\"preset.created\"").unwrap();
        assert_eq!(e, WebhookEvent::PresetCreated);
    }

    #[test]
    fn test_push_type_mapping() {
        assert_eq!(WebhookEvent::TaskUpdated.push_type(), "task:updated");
        assert_eq!(WebhookEvent::WebhookCreated.push_type(), "webhook:created");
    }
}
