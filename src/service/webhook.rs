//! Webhook management façade.

use std::sync::Arc;

use tracing::info;

use crate::database::models::webhook::{db_model_to_webhook, webhook_to_db_model};
use crate::database::models::Pagination;
use crate::database::repositories::WebhookRepository;
use crate::domain::{NewWebhook, Webhook, WebhookEvent};
use crate::events::EventBus;
use crate::Result;

pub struct WebhookService {
    repository: Arc<dyn WebhookRepository>,
    bus: EventBus,
}

impl WebhookService {
    pub fn new(repository: Arc<dyn WebhookRepository>, bus: EventBus) -> Self {
        Self { repository, bus }
    }

    pub async fn create(&self, new: NewWebhook) -> Result<Webhook> {
        let webhook = Webhook::from_new(new);
        self.repository.create(&webhook_to_db_model(&webhook)).await?;
        info!(
            "created webhook for event {} (uuid: {})",
            webhook.event, webhook.uuid
        );
        self.bus.emit(WebhookEvent::WebhookCreated, &webhook);
        Ok(webhook)
    }

    pub async fn update(&self, uuid: &str, new: NewWebhook) -> Result<Webhook> {
        let mut webhook = self.get(uuid).await?;
        webhook.event = new.event;
        webhook.url = new.url;
        self.repository.update(&webhook_to_db_model(&webhook)).await?;
        self.bus.emit(WebhookEvent::WebhookUpdated, &webhook);
        Ok(webhook)
    }

    pub async fn get(&self, uuid: &str) -> Result<Webhook> {
        let row = self.repository.first(uuid).await?;
        Ok(db_model_to_webhook(&row))
    }

    pub async fn list(&self, pagination: &Pagination) -> Result<(Vec<Webhook>, u64)> {
        let (rows, total) = self.repository.list(pagination).await?;
        Ok((rows.iter().map(db_model_to_webhook).collect(), total))
    }

    pub async fn delete(&self, uuid: &str) -> Result<()> {
        let webhook = self.get(uuid).await?;
        self.repository.soft_delete(uuid).await?;
        info!(
            "deleted webhook for event {} (uuid: {})",
            webhook.event, webhook.uuid
        );
        self.bus.emit(WebhookEvent::WebhookDeleted, &webhook);
        Ok(())
    }
}
