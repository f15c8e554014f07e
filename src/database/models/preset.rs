//! Preset row model and domain conversions.

use chrono::Utc;
use sqlx::FromRow;

use crate::domain::{NewPreset, Preset};

#[derive(Debug, Clone, FromRow)]
pub struct PresetDbModel {
    pub uuid: String,
    pub name: String,
    pub description: Option<String>,
    pub command: String,
    pub output_file: Option<String>,
    pub priority: i32,
    pub pre_processing: Option<String>,
    pub post_processing: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

pub fn preset_to_db_model(preset: &Preset) -> PresetDbModel {
    PresetDbModel {
        uuid: preset.uuid.clone(),
        name: preset.name.clone(),
        description: preset.description.clone(),
        command: preset.command.clone(),
        output_file: preset.output_file.clone(),
        priority: preset.priority,
        pre_processing: preset
            .pre_processing
            .as_ref()
            .and_then(|h| serde_json::to_string(h).ok()),
        post_processing: preset
            .post_processing
            .as_ref()
            .and_then(|h| serde_json::to_string(h).ok()),
        created_at: preset.created_at.to_rfc3339(),
        updated_at: Utc::now().to_rfc3339(),
        deleted_at: None,
    }
}

pub fn db_model_to_preset(row: &PresetDbModel) -> Preset {
    Preset {
        uuid: row.uuid.clone(),
        name: row.name.clone(),
        description: row.description.clone(),
        command: row.command.clone(),
        output_file: row.output_file.clone(),
        priority: row.priority,
        pre_processing: row
            .pre_processing
            .as_ref()
            .and_then(|s| serde_json::from_str(s).ok()),
        post_processing: row
            .post_processing
            .as_ref()
            .and_then(|s| serde_json::from_str(s).ok()),
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

    #[test]
    fn test_row_round_trip() {
        let preset = Preset::from_new(NewPreset {
            name: "archive".to_string(),
            command: "-i ${INPUT_FILE} -c copy ${OUTPUT_FILE}".to_string(),
            output_file: Some("${INPUT_FILE_DIR}/${INPUT_FILE_BASENAME}.mkv".to_string()),
            ..Default::default()
        });
        let row = preset_to_db_model(&preset);
        let back = db_model_to_preset(&row);
        assert_eq!(back.uuid, preset.uuid);
        assert_eq!(back.name, "archive");
        assert_eq!(back.output_file, preset.output_file);
    }
}
