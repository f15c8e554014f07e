//! Webhook repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::database::models::{Pagination, WebhookDbModel};
use crate::domain::{Webhook, WebhookEvent};
use crate::{Error, Result};

#[async_trait]
pub trait WebhookRepository: Send + Sync {
    async fn create(&self, webhook: &WebhookDbModel) -> Result<()>;
    async fn update(&self, webhook: &WebhookDbModel) -> Result<()>;
    async fn first(&self, uuid: &str) -> Result<WebhookDbModel>;
    async fn list(&self, pagination: &Pagination) -> Result<(Vec<WebhookDbModel>, u64)>;
    /// All live webhooks registered for an event.
    async fn list_by_event(&self, event: WebhookEvent) -> Result<Vec<Webhook>>;
    async fn soft_delete(&self, uuid: &str) -> Result<()>;
    async fn count(&self) -> Result<u64>;
    async fn count_deleted(&self) -> Result<u64>;
}

pub struct SqlxWebhookRepository {
    pool: SqlitePool,
}

impl SqlxWebhookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookRepository for SqlxWebhookRepository {
    async fn create(&self, webhook: &WebhookDbModel) -> Result<()> {
        sqlx::query(
            "INSERT INTO webhook (uuid, event, url, created_at, updated_at, deleted_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&webhook.uuid)
        .bind(&webhook.event)
        .bind(&webhook.url)
        .bind(&webhook.created_at)
        .bind(&webhook.updated_at)
        .bind(&webhook.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, webhook: &WebhookDbModel) -> Result<()> {
        let result = sqlx::query(
            "UPDATE webhook SET event = ?, url = ?, updated_at = ? \
             WHERE uuid = ? AND deleted_at IS NULL",
        )
        .bind(&webhook.event)
        .bind(&webhook.url)
        .bind(Utc::now().to_rfc3339())
        .bind(&webhook.uuid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Webhook", &webhook.uuid));
        }
        Ok(())
    }

    async fn first(&self, uuid: &str) -> Result<WebhookDbModel> {
        sqlx::query_as::<_, WebhookDbModel>(
            "SELECT * FROM webhook WHERE uuid = ? AND deleted_at IS NULL",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("Webhook", uuid))
    }

    async fn list(&self, pagination: &Pagination) -> Result<(Vec<WebhookDbModel>, u64)> {
        let webhooks = sqlx::query_as::<_, WebhookDbModel>(
            "SELECT * FROM webhook WHERE deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM webhook WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok((webhooks, total.0 as u64))
    }

    async fn list_by_event(&self, event: WebhookEvent) -> Result<Vec<Webhook>> {
        let rows = sqlx::query_as::<_, WebhookDbModel>(
            "SELECT * FROM webhook WHERE event = ? AND deleted_at IS NULL",
        )
        .bind(event.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(crate::database::models::webhook::db_model_to_webhook)
            .collect())
    }

    async fn soft_delete(&self, uuid: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE webhook SET deleted_at = ?, updated_at = ? \
             WHERE uuid = ? AND deleted_at IS NULL",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .bind(uuid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Webhook", uuid));
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM webhook WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 as u64)
    }

    async fn count_deleted(&self) -> Result<u64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM webhook WHERE deleted_at IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 as u64)
    }
}
