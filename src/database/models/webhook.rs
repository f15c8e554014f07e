//! Webhook row model and domain conversions.

use chrono::Utc;
use sqlx::FromRow;

use crate::domain::{Webhook, WebhookEvent};

#[derive(Debug, Clone, FromRow)]
pub struct WebhookDbModel {
    pub uuid: String,
    pub event: String,
    pub url: String,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

pub fn webhook_to_db_model(webhook: &Webhook) -> WebhookDbModel {
    WebhookDbModel {
        uuid: webhook.uuid.clone(),
        event: webhook.event.as_str().to_string(),
        url: webhook.url.clone(),
        created_at: webhook.created_at.to_rfc3339(),
        updated_at: Utc::now().to_rfc3339(),
        deleted_at: None,
    }
}

pub fn db_model_to_webhook(row: &WebhookDbModel) -> Webhook {
    Webhook {
        uuid: row.uuid.clone(),
        event: WebhookEvent::parse(&row.event).unwrap_or(WebhookEvent::TaskUpdated),
        url: row.url.clone(),
        created_at: chrono::DateTime::parse_from_rfc3339(&row.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: chrono::DateTime::parse_from_rfc3339(&row.updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewWebhook;

    #[test]
    fn test_row_round_trip() {
        let webhook = Webhook::from_new(NewWebhook {
            event: WebhookEvent::TaskCreated,
            url: "http://localhost:9000/hook".to_string(),
        });
        let row = webhook_to_db_model(&webhook);
        assert_eq!(row.event, "task.created");

        let back = db_model_to_webhook(&row);
        assert_eq!(back.uuid, webhook.uuid);
        assert_eq!(back.event, WebhookEvent::TaskCreated);
        assert_eq!(back.url, webhook.url);
    }
}
