//! Проект ролика и его сохранение
//!
//! Запись проекта хранится одним JSON файлом под фиксированным ключом
//! и проверяется при загрузке.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::{find_video_template, EMOTION_GOALS, VIDEO_TEMPLATES, VOICE_PRESETS};
use crate::error::{ClipSyncError, Result};
use crate::script::Script;
use crate::subtitle::style::SubtitleStyleKind;

/// Ключ, под которым хранится запись проекта
pub const PROJECT_STORAGE_KEY: &str = "project_config_v5";

/// Соотношение сторон кадра
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    Classic,
    #[serde(rename = "21:9")]
    Ultrawide,
    /// Размер задается `custom_width` и `custom_height`
    Custom,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Portrait => "9:16",
            Self::Landscape => "16:9",
            Self::Square => "1:1",
            Self::Classic => "4:3",
            Self::Ultrawide => "21:9",
            Self::Custom => "Custom",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Resolution {
    #[default]
    #[serde(rename = "720p")]
    Hd,
    #[serde(rename = "1080p")]
    FullHd,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hd => "720p",
            Self::FullHd => "1080p",
        }
    }
}

/// Запись проекта
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub id: String,
    pub name: String,
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    pub aspect_ratio: AspectRatio,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_height: Option<u32>,
    pub resolution: Resolution,
    pub script: Script,
    pub voice_id: String,
    pub template_id: String,
    pub emotion_goal: String,
    #[serde(default)]
    pub seo_keywords: String,
    /// Целевая длительность ролика, секунды
    pub duration: u32,
    #[serde(default)]
    pub subtitle_style: SubtitleStyleKind,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: "Dự án Sáng tạo 2025".to_string(),
            prompt: String::new(),
            negative_prompt: String::new(),
            aspect_ratio: AspectRatio::default(),
            custom_width: None,
            custom_height: None,
            resolution: Resolution::default(),
            script: Script::default(),
            voice_id: VOICE_PRESETS[0].id.to_string(),
            template_id: VIDEO_TEMPLATES[0].id.to_string(),
            emotion_goal: EMOTION_GOALS[0].to_string(),
            seo_keywords: String::new(),
            duration: 25,
            subtitle_style: SubtitleStyleKind::default(),
        }
    }
}

impl ProjectConfig {
    /// Проверить запись проекта
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ClipSyncError::InvalidFormat("project id is empty".to_string()));
        }
        if self.duration == 0 {
            return Err(ClipSyncError::InvalidFormat("project duration must be positive".to_string()));
        }
        if self.aspect_ratio == AspectRatio::Custom {
            match (self.custom_width, self.custom_height) {
                (Some(w), Some(h)) if w > 0 && h > 0 => {}
                _ => {
                    return Err(ClipSyncError::InvalidFormat(
                        "custom aspect ratio requires positive width and height".to_string(),
                    ))
                }
            }
        }
        self.script.validate()
    }

    /// Соотношение сторон для запроса генерации видео.
    ///
    /// Произвольный размер сводится к ближайшей ориентации.
    pub fn video_aspect_ratio(&self) -> &'static str {
        match (self.aspect_ratio, self.custom_width, self.custom_height) {
            (AspectRatio::Custom, Some(w), Some(h)) if w > h => AspectRatio::Landscape.as_str(),
            (AspectRatio::Custom, _, _) => AspectRatio::Portrait.as_str(),
            (ratio, _, _) => ratio.as_str(),
        }
    }

    /// Промпт пользователя с префиксом выбранного шаблона
    pub fn templated_prompt(&self) -> String {
        let prefix = find_video_template(&self.template_id)
            .map(|t| t.prompt_prefix)
            .unwrap_or("");
        format!("{}{}", prefix, self.prompt)
    }
}

/// Хранилище записи проекта в директории
#[derive(Debug, Clone)]
pub struct ProjectStore {
    dir: PathBuf,
}

impl ProjectStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", PROJECT_STORAGE_KEY))
    }

    pub fn save(&self, project: &ProjectConfig) -> Result<()> {
        project.validate()?;
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(project)?;
        fs::write(self.path(), json)?;
        info!("Saved project '{}' to {}", project.name, self.path().display());
        Ok(())
    }

    /// Загрузить проект; `Ok(None)`, если он еще не сохранялся
    pub fn load(&self) -> Result<Option<ProjectConfig>> {
        let path = self.path();
        if !path.exists() {
            debug!("No saved project at {}", path.display());
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        let project: ProjectConfig = serde_json::from_str(&json)
            .map_err(|e| ClipSyncError::InvalidFormat(format!("saved project is malformed: {}", e)))?;
        project.validate()?;
        Ok(Some(project))
    }

    /// Удалить сохраненную запись
    pub fn reset(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            fs::remove_file(&path)?;
            info!("Removed saved project {}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{BeatRole, ScriptBeat};
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let project = ProjectConfig::default();
        assert_eq!(project.aspect_ratio.as_str(), "9:16");
        assert_eq!(project.resolution.as_str(), "720p");
        assert_eq!(project.duration, 25);
        assert_eq!(project.subtitle_style, SubtitleStyleKind::Viral);
        assert_eq!(project.voice_id, "v1");
        assert!(project.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        assert!(store.load().unwrap().is_none());

        let mut project = ProjectConfig::default();
        project.prompt = "Mèo phi hành gia".to_string();
        project.script = Script::new(vec![ScriptBeat::new(BeatRole::Hook, "Bạn có biết?", 3.0)]).unwrap();
        store.save(&project).unwrap();

        assert_eq!(store.load().unwrap(), Some(project));
        store.reset().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_record_uses_camel_case_keys() {
        let json = serde_json::to_value(ProjectConfig::default()).unwrap();
        assert_eq!(json["aspectRatio"], "9:16");
        assert_eq!(json["subtitleStyle"], "viral");
        assert!(json.get("customWidth").is_none());
        assert!(json["script"].is_array());
    }

    #[test]
    fn test_load_rejects_invalid_beats() {
        let dir = tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        let mut json = serde_json::to_value(ProjectConfig::default()).unwrap();
        json["script"] = serde_json::json!([{ "type": "HOOK", "content": "x", "duration": 0 }]);
        fs::write(store.path(), json.to_string()).unwrap();

        assert!(matches!(store.load(), Err(ClipSyncError::InvalidFormat(_))));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(store.load(), Err(ClipSyncError::InvalidFormat(_))));
    }

    #[test]
    fn test_custom_aspect_ratio() {
        let mut project = ProjectConfig {
            aspect_ratio: AspectRatio::Custom,
            ..ProjectConfig::default()
        };
        assert!(project.validate().is_err());

        project.custom_width = Some(1920);
        project.custom_height = Some(1080);
        assert!(project.validate().is_ok());
        assert_eq!(project.video_aspect_ratio(), "16:9");
    }

    #[test]
    fn test_templated_prompt() {
        let project = ProjectConfig {
            prompt: "a cat".to_string(),
            template_id: "product_ad".to_string(),
            ..ProjectConfig::default()
        };
        assert!(project.templated_prompt().starts_with("luxury product commercial"));
        assert!(project.templated_prompt().ends_with("a cat"));

        let unknown = ProjectConfig {
            template_id: "missing".to_string(),
            ..project
        };
        assert_eq!(unknown.templated_prompt(), "a cat");
    }
}
