//! Preset management façade.

use std::sync::Arc;

use tracing::info;

use crate::database::models::preset::{db_model_to_preset, preset_to_db_model};
use crate::database::models::Pagination;
use crate::database::repositories::PresetRepository;
use crate::domain::{NewPreset, Preset, WebhookEvent};
use crate::events::EventBus;
use crate::{Error, Result};

pub struct PresetService {
    repository: Arc<dyn PresetRepository>,
    bus: EventBus,
}

impl PresetService {
    pub fn new(repository: Arc<dyn PresetRepository>, bus: EventBus) -> Self {
        Self { repository, bus }
    }

    pub async fn create(&self, new: NewPreset) -> Result<Preset> {
        if new.name.trim().is_empty() {
            return Err(Error::validation("preset name must not be empty"));
        }
        if new.command.trim().is_empty() {
            return Err(Error::validation("preset command must not be empty"));
        }

        let preset = Preset::from_new(new);
        self.repository.create(&preset_to_db_model(&preset)).await?;
        info!("created preset {} (uuid: {})", preset.name, preset.uuid);
        self.bus.emit(WebhookEvent::PresetCreated, &preset);
        Ok(preset)
    }

    pub async fn update(&self, uuid: &str, new: NewPreset) -> Result<Preset> {
        let mut preset = self.get(uuid).await?;
        preset.name = new.name;
        preset.description = new.description;
        preset.command = new.command;
        preset.output_file = new.output_file;
        preset.priority = new.priority.unwrap_or(preset.priority);
        preset.pre_processing = new.pre_processing;
        preset.post_processing = new.post_processing;
        self.repository.update(&preset_to_db_model(&preset)).await?;
        self.bus.emit(WebhookEvent::PresetUpdated, &preset);
        Ok(preset)
    }

    pub async fn get(&self, uuid: &str) -> Result<Preset> {
        let row = self.repository.first(uuid).await?;
        Ok(db_model_to_preset(&row))
    }

    pub async fn list(&self, pagination: &Pagination) -> Result<(Vec<Preset>, u64)> {
        let (rows, total) = self.repository.list(pagination).await?;
        Ok((rows.iter().map(db_model_to_preset).collect(), total))
    }

    pub async fn delete(&self, uuid: &str) -> Result<()> {
        let preset = self.get(uuid).await?;
        self.repository.soft_delete(uuid).await?;
        info!("deleted preset {} (uuid: {})", preset.name, preset.uuid);
        self.bus.emit(WebhookEvent::PresetDeleted, &preset);
        Ok(())
    }
}
