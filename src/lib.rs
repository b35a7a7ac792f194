//! Основной файл библиотеки clip-sync
//!
//! Библиотека собирает короткий ролик из ответов генеративного сервиса:
//! сценарий, видео и озвучку по битам, а затем экспортирует видео с
//! вшитыми субтитрами. Ход работы отслеживается через систему прогресса.

pub mod ai;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod media;
pub mod notification;
pub mod progress;
pub mod project;
pub mod script;
pub mod studio;
pub mod subtitle;
pub mod tts;
pub mod utils;

use std::sync::Arc;

pub use crate::ai::{GeminiClient, GenerativeService, ReferenceImage};
pub use crate::config::{ClipSyncConfig, TimelineSync, TtsVoice};
pub use crate::error::{ClipSyncError, Result};
pub use crate::export::{ExportArtifact, Exporter, FfmpegBackend};
pub use crate::media::{AudioTrack, AudioTrackBuilder};
pub use crate::progress::{ProcessStep, ProgressTracker};
pub use crate::project::{ProjectConfig, ProjectStore};
pub use crate::script::{BeatRole, Script, ScriptBeat};
pub use crate::studio::{GenerationEvent, GenerationState, Studio};
pub use crate::subtitle::{SubtitleStyle, SubtitleStyleKind};

use crate::subtitle::FontdueGlyphs;

/// Координатор, работающий с Gemini/Veo
pub fn gemini_studio(config: ClipSyncConfig) -> Result<Studio<GeminiClient>> {
    config.validate()?;
    let client = GeminiClient::new(&config)?;
    Ok(Studio::new(Arc::new(client), config))
}

/// Экспорт через ffmpeg со шрифтами из настроек субтитров
pub fn ffmpeg_exporter(config: &ClipSyncConfig) -> Result<Exporter> {
    let font_path = config
        .subtitles
        .font_path
        .as_deref()
        .ok_or_else(|| ClipSyncError::Configuration("subtitles.font_path is not set".to_string()))?;
    let glyphs = FontdueGlyphs::load(font_path, config.subtitles.bold_font_path.as_deref())?;
    Ok(Exporter::new(
        Arc::new(FfmpegBackend::new(config.export.clone())),
        Arc::new(glyphs),
    ))
}
