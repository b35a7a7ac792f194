//! Координатор производства ролика
//!
//! [`Studio`] владеет проектом и состоянием генерации и отдает их наружу
//! неизменяемыми снимками `Arc`. Состояние генерации меняется только через
//! [`GenerationState::reduce`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use log::{error, info, warn};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::ai::{poll_until_done, GenerativeService, ReferenceImage, VideoRequest};
use crate::config::{find_voice_preset, ClipSyncConfig, TimelineSync};
use crate::error::{ClipSyncError, Result};
use crate::export::{ExportArtifact, ExportRequest, Exporter, FrameSource};
use crate::media::video::FfmpegFrameSource;
use crate::progress::{ProcessStep, ProgressTracker};
use crate::project::{ProjectConfig, ProjectStore};
use crate::script::Script;
use crate::subtitle::style::SubtitleStyle;
use crate::subtitle::vtt::write_webvtt;
use crate::tts::{synthesize_voiceover, SpeechCache, Voiceover};
use crate::utils::temp::TempFileManager;

const STATUS_READY: &str = "Sẵn sàng";
const STATUS_WRITING_SCRIPT: &str = "AI đang biên kịch & tối ưu phụ đề...";
const STATUS_SCRIPT_READY: &str = "Kịch bản viral sẵn sàng!";
const STATUS_CONNECTING: &str = "Kết nối Veo 3 Engine...";
const STATUS_RENDERING: &str = "AI đang vẽ từng khung hình...";
const STATUS_VOICEOVER: &str = "Lồng tiếng AI Tiếng Việt...";
const STATUS_DONE: &str = "Hoàn tất!";

/// Префикс промпта, когда задано опорное изображение персонажа
pub const CHARACTER_CONSISTENCY_PROMPT: &str =
    "Keep the main character from the reference image consistent throughout the video. ";

/// Состояние генерации
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationState {
    pub is_generating: bool,
    pub status: String,
    /// 0..=100
    pub progress: u8,
    pub error: Option<String>,
    /// Последнее сгенерированное видео
    pub video: Option<Bytes>,
    /// Все видео сеанса в порядке генерации
    pub video_queue: Vec<Bytes>,
    /// Ключ API отклонен, нужна повторная авторизация
    pub needs_credentials: bool,
}

impl Default for GenerationState {
    fn default() -> Self {
        Self {
            is_generating: false,
            status: STATUS_READY.to_string(),
            progress: 0,
            error: None,
            video: None,
            video_queue: Vec::new(),
            needs_credentials: false,
        }
    }
}

/// События генерации
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    ScriptStarted,
    ScriptReady,
    VideoStarted,
    /// Операция еще идет
    PollTick,
    VoiceoverStarted,
    VideoReady(Bytes),
    Failed { message: String, missing_credential: bool },
    CredentialsProvided,
}

impl GenerationEvent {
    pub fn failed(err: &ClipSyncError) -> Self {
        Self::Failed {
            message: err.to_string(),
            missing_credential: err.is_missing_credential(),
        }
    }
}

impl GenerationState {
    /// Следующее состояние после события
    pub fn reduce(&self, event: GenerationEvent) -> Self {
        let mut next = self.clone();
        match event {
            GenerationEvent::ScriptStarted => {
                next.is_generating = true;
                next.status = STATUS_WRITING_SCRIPT.to_string();
            }
            GenerationEvent::ScriptReady => {
                next.is_generating = false;
                next.status = STATUS_SCRIPT_READY.to_string();
            }
            GenerationEvent::VideoStarted => {
                next.is_generating = true;
                next.status = STATUS_CONNECTING.to_string();
                next.progress = 5;
                next.error = None;
            }
            GenerationEvent::PollTick => {
                next.progress = (self.progress + 2).min(95);
                next.status = STATUS_RENDERING.to_string();
            }
            GenerationEvent::VoiceoverStarted => {
                next.status = STATUS_VOICEOVER.to_string();
            }
            GenerationEvent::VideoReady(video) => {
                next.is_generating = false;
                next.status = STATUS_DONE.to_string();
                next.progress = 100;
                next.video_queue.push(video.clone());
                next.video = Some(video);
            }
            GenerationEvent::Failed {
                message,
                missing_credential,
            } => {
                next.is_generating = false;
                next.error = Some(message);
                next.needs_credentials |= missing_credential;
            }
            GenerationEvent::CredentialsProvided => {
                next.needs_credentials = false;
            }
        }
        next
    }
}

/// Запрос генерации видео для проекта
pub fn build_video_request(project: &ProjectConfig, has_reference: bool) -> VideoRequest {
    let character = if has_reference { CHARACTER_CONSISTENCY_PROMPT } else { "" };
    let prompt = format!(
        "{}{}. Style: {}. Emotional arc: {}. Ensure the main character appears throughout.",
        character,
        project.templated_prompt(),
        project.seo_keywords,
        project.emotion_goal
    );
    let negative_prompt = Some(project.negative_prompt.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    VideoRequest {
        prompt,
        negative_prompt,
        aspect_ratio: project.video_aspect_ratio().to_string(),
        resolution: project.resolution.as_str().to_string(),
    }
}

/// Координатор: проект, генерация, озвучка и экспорт
pub struct Studio<S: GenerativeService + ?Sized> {
    service: Arc<S>,
    config: ClipSyncConfig,
    project: RwLock<Arc<ProjectConfig>>,
    state: RwLock<Arc<GenerationState>>,
    voiceover: RwLock<Option<Arc<Voiceover>>>,
    cache: Option<SpeechCache>,
    tracker: Option<Arc<ProgressTracker>>,
}

impl<S: GenerativeService + ?Sized> Studio<S> {
    pub fn new(service: Arc<S>, config: ClipSyncConfig) -> Self {
        let cache = if config.use_caching {
            match SpeechCache::new(&config) {
                Ok(cache) => Some(cache),
                Err(e) => {
                    warn!("Speech cache directory is unavailable, caching in memory: {}", e);
                    Some(SpeechCache::in_memory())
                }
            }
        } else {
            None
        };
        Self {
            service,
            config,
            project: RwLock::new(Arc::new(ProjectConfig::default())),
            state: RwLock::new(Arc::new(GenerationState::default())),
            voiceover: RwLock::new(None),
            cache,
            tracker: None,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<ProgressTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn config(&self) -> &ClipSyncConfig {
        &self.config
    }

    /// Снимок проекта
    pub fn project(&self) -> Arc<ProjectConfig> {
        Arc::clone(&self.project.read())
    }

    /// Снимок состояния генерации
    pub fn state(&self) -> Arc<GenerationState> {
        Arc::clone(&self.state.read())
    }

    pub fn voiceover(&self) -> Option<Arc<Voiceover>> {
        self.voiceover.read().clone()
    }

    /// Изменить проект; изменение видно в следующих снимках
    pub fn update_project<F>(&self, update: F)
    where
        F: FnOnce(&mut ProjectConfig),
    {
        let mut guard = self.project.write();
        let mut project = ProjectConfig::clone(&guard);
        update(&mut project);
        *guard = Arc::new(project);
    }

    pub fn dispatch(&self, event: GenerationEvent) -> Arc<GenerationState> {
        let mut guard = self.state.write();
        let next = Arc::new(guard.reduce(event));
        *guard = Arc::clone(&next);
        next
    }

    /// Пользователь выбрал новый ключ API
    pub fn credentials_provided(&self) {
        self.dispatch(GenerationEvent::CredentialsProvided);
    }

    /// Заменить текст бита
    pub fn edit_beat(&self, index: usize, content: impl Into<String>) -> Result<()> {
        let mut guard = self.project.write();
        let mut project = ProjectConfig::clone(&guard);
        project.script.edit_content(index, content)?;
        *guard = Arc::new(project);
        Ok(())
    }

    /// Загрузить сохраненный проект. Поврежденная запись пропускается.
    pub fn load_project(&self, store: &ProjectStore) -> Result<bool> {
        match store.load() {
            Ok(Some(project)) => {
                info!("Loaded project '{}'", project.name);
                *self.project.write() = Arc::new(project);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(ClipSyncError::InvalidFormat(message)) => {
                warn!("Ignoring saved project: {}", message);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub fn save_project(&self, store: &ProjectStore) -> Result<()> {
        store.save(&self.project())
    }

    /// Новый проект с настройками по умолчанию
    pub fn reset_project(&self) {
        *self.project.write() = Arc::new(ProjectConfig::default());
        *self.voiceover.write() = None;
    }

    fn fail(&self, err: ClipSyncError) -> ClipSyncError {
        error!("Generation failed: {}", err);
        if err.is_missing_credential() {
            warn!("API key was rejected, re-authentication is required");
        }
        self.dispatch(GenerationEvent::failed(&err));
        err
    }

    /// Сгенерировать сценарий по промпту проекта. Пустой промпт ничего не делает.
    pub async fn generate_script(&self) -> Result<()> {
        let project = self.project();
        if project.prompt.trim().is_empty() {
            return Ok(());
        }

        self.dispatch(GenerationEvent::ScriptStarted);
        if let Some(t) = &self.tracker {
            t.set_step(ProcessStep::ScriptGeneration);
        }

        let beats = match self
            .service
            .generate_script(&project.prompt, &project.emotion_goal, &project.seo_keywords, project.duration)
            .await
        {
            Ok(beats) => beats,
            Err(e) => return Err(self.fail(e)),
        };

        let script = Script::from_generated(beats);
        info!("Script ready: {} beats, {:.1}s", script.len(), script.total_duration());
        self.update_project(|p| p.script = script);
        self.dispatch(GenerationEvent::ScriptReady);
        if let Some(t) = &self.tracker {
            t.update_step_progress(100.0, Some("Сценарий готов".to_string()));
        }
        Ok(())
    }

    /// Сгенерировать видео, дождаться его и озвучить сценарий
    pub async fn produce_video(&self, reference: Option<&ReferenceImage>, cancel: &CancellationToken) -> Result<()> {
        match self.run_production(reference, cancel).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn run_production(&self, reference: Option<&ReferenceImage>, cancel: &CancellationToken) -> Result<()> {
        let project = self.project();
        self.dispatch(GenerationEvent::VideoStarted);
        if let Some(t) = &self.tracker {
            t.set_step(ProcessStep::VideoGeneration);
        }

        let request = build_video_request(&project, reference.is_some());
        info!(
            "Submitting video generation ({}, {})",
            request.aspect_ratio, request.resolution
        );
        let handle = self.service.generate_video(&request, reference).await?;

        let tracker = self.tracker.as_deref();
        let max_attempts = self.config.poll.max_attempts.max(1) as f32;
        let uri = poll_until_done(self.service.as_ref(), &handle, &self.config.poll, cancel, |attempt| {
            let state = self.dispatch(GenerationEvent::PollTick);
            if let Some(t) = tracker {
                t.update_step_progress(
                    (attempt as f32 / max_attempts * 100.0).min(95.0),
                    Some(format!("Генерация видео: {}%", state.progress)),
                );
            }
        })
        .await?;

        let video = self.service.download(&uri).await?;
        info!("Downloaded generated video: {} bytes", video.len());

        self.dispatch(GenerationEvent::VoiceoverStarted);
        if let Some(t) = &self.tracker {
            t.set_step(ProcessStep::SpeechSynthesis);
        }
        let voice = find_voice_preset(&project.voice_id).voice;
        let voiceover = synthesize_voiceover(
            self.service.as_ref(),
            &project.script,
            voice,
            &self.config,
            self.cache.as_ref(),
            tracker,
            cancel,
        )
        .await?;

        if let Some(voiceover) = &voiceover {
            if self.config.timeline_sync == TimelineSync::FollowSpeech {
                let retimed = project.script.retimed_to_speech(&voiceover.track);
                info!(
                    "Retimed script to speech: {:.2}s -> {:.2}s",
                    project.script.total_duration(),
                    retimed.total_duration()
                );
                self.update_project(|p| p.script = retimed);
            }
        }
        *self.voiceover.write() = voiceover.map(Arc::new);

        self.dispatch(GenerationEvent::VideoReady(video));
        Ok(())
    }

    /// Экспорт с вшитыми субтитрами из произвольного источника кадров.
    ///
    /// Рядом с результатом пишется WebVTT сценария.
    pub async fn export_from(
        &self,
        exporter: &Exporter,
        source: Box<dyn FrameSource>,
        output: &Path,
        cancel: CancellationToken,
    ) -> Result<ExportArtifact> {
        let project = self.project();
        let request = ExportRequest {
            script: project.script.clone(),
            style: SubtitleStyle::from(project.subtitle_style),
            metrics: self.config.subtitles.clone(),
            narration_wav: self.voiceover().map(|v| v.wav.clone()),
            output: output.to_path_buf(),
            cleanup_temp_files: self.config.cleanup_temp_files,
        };

        if let Some(t) = &self.tracker {
            t.set_step(ProcessStep::Export);
        }
        let artifact = exporter.export(source, request, cancel, self.tracker.clone()).await?;

        if !project.script.is_empty() {
            let vtt_path = webvtt_sidecar_path(output);
            if let Err(e) = write_webvtt(&project.script, &vtt_path) {
                warn!("Failed to write subtitles sidecar {}: {}", vtt_path.display(), e);
            }
        }
        if let Some(t) = &self.tracker {
            t.complete();
        }
        Ok(artifact)
    }

    /// Экспорт последнего сгенерированного видео через ffmpeg
    pub async fn export_generated(
        &self,
        exporter: &Exporter,
        output: &Path,
        cancel: CancellationToken,
    ) -> Result<ExportArtifact> {
        let video = self
            .state()
            .video
            .clone()
            .ok_or_else(|| ClipSyncError::InvalidState("no generated video to export".to_string()))?;

        let mut temp = TempFileManager::new(self.config.cleanup_temp_files)?;
        let video_path = temp.write_temp_file("source", "mp4", &video)?;
        let source = FfmpegFrameSource::open(
            &self.config.export.ffmpeg_path,
            &self.config.export.ffprobe_path,
            &video_path,
        )?;
        self.export_from(exporter, Box::new(source), output, cancel).await
    }
}

/// `clip.webm` -> `clip.vtt`
pub fn webvtt_sidecar_path(output: &Path) -> PathBuf {
    output.with_extension("vtt")
}
