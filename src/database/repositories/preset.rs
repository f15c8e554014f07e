//! Preset repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::database::models::{Pagination, PresetDbModel};
use crate::{Error, Result};

#[async_trait]
pub trait PresetRepository: Send + Sync {
    async fn create(&self, preset: &PresetDbModel) -> Result<()>;
    async fn update(&self, preset: &PresetDbModel) -> Result<()>;
    async fn first(&self, uuid: &str) -> Result<PresetDbModel>;
    async fn list(&self, pagination: &Pagination) -> Result<(Vec<PresetDbModel>, u64)>;
    async fn soft_delete(&self, uuid: &str) -> Result<()>;
    async fn count(&self) -> Result<u64>;
    async fn count_deleted(&self) -> Result<u64>;
}

pub struct SqlxPresetRepository {
    pool: SqlitePool,
}

impl SqlxPresetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PresetRepository for SqlxPresetRepository {
    async fn create(&self, preset: &PresetDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO preset (
                uuid, name, description, command, output_file, priority,
                pre_processing, post_processing, created_at, updated_at, deleted_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&preset.uuid)
        .bind(&preset.name)
        .bind(&preset.description)
        .bind(&preset.command)
        .bind(&preset.output_file)
        .bind(preset.priority)
        .bind(&preset.pre_processing)
        .bind(&preset.post_processing)
        .bind(&preset.created_at)
        .bind(&preset.updated_at)
        .bind(&preset.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, preset: &PresetDbModel) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE preset SET
                name = ?, description = ?, command = ?, output_file = ?,
                priority = ?, pre_processing = ?, post_processing = ?, updated_at = ?
            WHERE uuid = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&preset.name)
        .bind(&preset.description)
        .bind(&preset.command)
        .bind(&preset.output_file)
        .bind(preset.priority)
        .bind(&preset.pre_processing)
        .bind(&preset.post_processing)
        .bind(Utc::now().to_rfc3339())
        .bind(&preset.uuid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Preset", &preset.uuid));
        }
        Ok(())
    }

    async fn first(&self, uuid: &str) -> Result<PresetDbModel> {
        sqlx::query_as::<_, PresetDbModel>(
            "SELECT * FROM preset WHERE uuid = ? AND deleted_at IS NULL",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("Preset", uuid))
    }

    async fn list(&self, pagination: &Pagination) -> Result<(Vec<PresetDbModel>, u64)> {
        let presets = sqlx::query_as::<_, PresetDbModel>(
            "SELECT * FROM preset WHERE deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM preset WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok((presets, total.0 as u64))
    }

    async fn soft_delete(&self, uuid: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE preset SET deleted_at = ?, updated_at = ? \
             WHERE uuid = ? AND deleted_at IS NULL",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .bind(uuid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Preset", uuid));
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM preset WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 as u64)
    }

    async fn count_deleted(&self) -> Result<u64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM preset WHERE deleted_at IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::preset::{db_model_to_preset, preset_to_db_model};
    use crate::database::{init_pool, run_migrations};
    use crate::domain::{NewPreset, Preset};

    async fn repository() -> SqlxPresetRepository {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqlxPresetRepository::new(pool)
    }

    #[tokio::test]
    async fn test_crud_cycle() {
        let repo = repository().await;
        let preset = Preset::from_new(NewPreset {
            name: "remux".to_string(),
            command: "-i ${INPUT_FILE} -c copy ${OUTPUT_FILE}".to_string(),
            ..Default::default()
        });
        repo.create(&preset_to_db_model(&preset)).await.unwrap();

        let mut row = repo.first(&preset.uuid).await.unwrap();
        row.name = "remux to mkv".to_string();
        repo.update(&row).await.unwrap();

        let fetched = db_model_to_preset(&repo.first(&preset.uuid).await.unwrap());
        assert_eq!(fetched.name, "remux to mkv");

        repo.soft_delete(&preset.uuid).await.unwrap();
        assert!(matches!(
            repo.first(&preset.uuid).await,
            Err(Error::NotFound { .. })
        ));
        assert_eq!(repo.count_deleted().await.unwrap(), 1);
    }
}
