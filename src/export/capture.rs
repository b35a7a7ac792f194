//! Захват кадров с субтитрами и их кодирование
//!
//! [`Exporter`] читает исходное видео кадр за кадром, для каждого кадра
//! заново берет время воспроизведения, рисует активный субтитр и отдает
//! кадр в [`CaptureSink`] вместе с дорожкой озвучки.

use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info, warn};
use tiny_skia::Pixmap;
use tokio_util::sync::CancellationToken;

use crate::config::SubtitleMetrics;
use crate::error::{ClipSyncError, Result};
use crate::export::compositor::compose_subtitle;
use crate::export::session::{ExportEvent, ExportSession, ExportState};
use crate::progress::ProgressTracker;
use crate::script::Script;
use crate::subtitle::canvas::GlyphSource;
use crate::subtitle::render::SubtitlePlacement;
use crate::subtitle::style::SubtitleStyle;
use crate::utils::temp::TempFileManager;

/// Источник кадров исходного видео
pub trait FrameSource: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn fps(&self) -> f64;
    /// Длительность источника в секундах, 0 если неизвестна
    fn duration(&self) -> f64;
    /// Следующий кадр или `None` в конце видео
    fn next_frame(&mut self) -> Result<Option<Pixmap>>;
    /// Время воспроизведения последнего выданного кадра
    fn current_time(&self) -> f64;
}

/// Параметры открываемого потока кодирования
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSpec {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Длительность источника в секундах, 0 если неизвестна.
    /// Поток заканчивается вместе с кадрами источника, а не по сценарию.
    pub duration: f64,
    /// WAV озвучки, если есть
    pub narration: Option<PathBuf>,
    pub output: PathBuf,
}

/// Готовый файл экспорта
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub path: PathBuf,
    pub bytes_written: u64,
    pub frames: u64,
    pub duration: f64,
}

/// Открытый поток кодирования
pub trait CaptureSink: Send {
    fn write_frame(&mut self, frame: &Pixmap) -> Result<()>;
    /// Дописать поток и закрыть файл
    fn finish(self: Box<Self>) -> Result<ExportArtifact>;
    /// Прервать запись и удалить частичный файл
    fn abort(self: Box<Self>);
}

/// Кодировщик, в который уходят кадры
pub trait CaptureBackend: Send + Sync {
    /// `CapabilityUnsupported`, если среда не умеет нужный формат
    fn check_capability(&self) -> Result<()>;
    fn open(&self, spec: &CaptureSpec) -> Result<Box<dyn CaptureSink>>;
}

/// Что экспортировать
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub script: Script,
    pub style: SubtitleStyle,
    pub metrics: SubtitleMetrics,
    /// Озвучка в WAV
    pub narration_wav: Option<Vec<u8>>,
    pub output: PathBuf,
    pub cleanup_temp_files: bool,
}

/// Снимок прогресса экспорта для вызывающей стороны
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportProgress {
    pub state: ExportState,
    /// 0..=100
    pub percent: u8,
    /// Время последнего кадра
    pub time: f64,
    /// Бит, субтитр которого нарисован на кадре
    pub subtitle: Option<usize>,
}

impl ExportProgress {
    fn of(session: &ExportSession, time: f64, subtitle: Option<usize>) -> Self {
        Self {
            state: session.state(),
            percent: session.progress(),
            time,
            subtitle,
        }
    }
}

/// Имя файла экспорта по умолчанию
pub fn default_export_file_name(container: &str) -> String {
    format!("clip_export_{}.{}", chrono::Utc::now().timestamp_millis(), container)
}

/// Экспорт ролика с вшитыми субтитрами
#[derive(Clone)]
pub struct Exporter {
    backend: Arc<dyn CaptureBackend>,
    glyphs: Arc<dyn GlyphSource>,
}

impl Exporter {
    pub fn new(backend: Arc<dyn CaptureBackend>, glyphs: Arc<dyn GlyphSource>) -> Self {
        Self { backend, glyphs }
    }

    /// Экспорт в фоновом потоке tokio
    pub async fn export(
        &self,
        mut source: Box<dyn FrameSource>,
        request: ExportRequest,
        cancel: CancellationToken,
        tracker: Option<Arc<ProgressTracker>>,
    ) -> Result<ExportArtifact> {
        let exporter = self.clone();
        tokio::task::spawn_blocking(move || {
            exporter.run_blocking(source.as_mut(), &request, &cancel, |progress| {
                if let Some(t) = &tracker {
                    if progress.state == ExportState::Capturing {
                        t.update_step_progress(progress.percent as f32, None);
                    }
                }
            })
        })
        .await
        .map_err(|e| ClipSyncError::VideoProcessing(format!("Export task failed: {}", e)))?
    }

    /// Синхронный цикл экспорта.
    ///
    /// При любой ошибке и при отмене сеанс возвращается в `Idle`, а
    /// частичный файл удаляется.
    pub fn run_blocking<F>(
        &self,
        source: &mut dyn FrameSource,
        request: &ExportRequest,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<ExportArtifact>
    where
        F: FnMut(&ExportProgress),
    {
        let mut session = ExportSession::new(request.script.total_duration(), source.duration());
        session.apply(ExportEvent::Start)?;
        on_progress(&ExportProgress::of(&session, 0.0, None));

        let result = self.capture(source, request, cancel, &mut session, &mut on_progress);
        if let Err(e) = &result {
            if e.is_cancelled() {
                warn!("Export cancelled");
            } else {
                error!("Export failed: {}", e);
            }
            session.apply(ExportEvent::Abort)?;
            on_progress(&ExportProgress::of(&session, 0.0, None));
        }
        result
    }

    fn capture<F>(
        &self,
        source: &mut dyn FrameSource,
        request: &ExportRequest,
        cancel: &CancellationToken,
        session: &mut ExportSession,
        on_progress: &mut F,
    ) -> Result<ExportArtifact>
    where
        F: FnMut(&ExportProgress),
    {
        self.backend.check_capability()?;

        let mut temp = TempFileManager::new(request.cleanup_temp_files)?;
        let narration = match &request.narration_wav {
            Some(wav) if !wav.is_empty() => Some(temp.write_temp_file("narration", "wav", wav)?),
            _ => {
                warn!("Exporting without narration audio");
                None
            }
        };
        if request.script.is_empty() {
            warn!("Exporting without subtitles: script is empty");
        }

        let spec = CaptureSpec {
            width: source.width(),
            height: source.height(),
            fps: source.fps(),
            duration: source.duration(),
            narration,
            output: request.output.clone(),
        };
        info!(
            "Exporting {}x{} @ {:.2} fps, {:.2}s to {}",
            spec.width,
            spec.height,
            spec.fps,
            spec.duration,
            spec.output.display()
        );

        let placement = SubtitlePlacement::for_frame(spec.width, spec.height, &request.metrics);
        let mut sink = self.backend.open(&spec)?;

        loop {
            if cancel.is_cancelled() {
                sink.abort();
                return Err(ClipSyncError::Cancelled);
            }

            let mut frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    sink.abort();
                    return Err(e);
                }
            };

            let time = source.current_time();
            let subtitle = compose_subtitle(
                &mut frame,
                self.glyphs.as_ref(),
                request.script.beats(),
                time,
                &request.style,
                &placement,
            );

            if let Err(e) = sink.write_frame(&frame) {
                sink.abort();
                return Err(e);
            }
            session.apply(ExportEvent::Tick { time })?;
            on_progress(&ExportProgress::of(session, time, subtitle));
        }

        session.apply(ExportEvent::SourceEnded)?;
        on_progress(&ExportProgress::of(session, source.current_time(), None));

        let artifact = sink.finish()?;
        session.apply(ExportEvent::Finished)?;
        on_progress(&ExportProgress::of(session, artifact.duration, None));

        info!(
            "Export finished: {} frames, {} bytes in {}",
            artifact.frames,
            artifact.bytes_written,
            artifact.path.display()
        );
        Ok(artifact)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use tiny_skia::Color;

    /// Однотонные кадры с заданными временами воспроизведения
    pub struct ScriptedFrameSource {
        pub width: u32,
        pub height: u32,
        pub times: Vec<f64>,
        pub duration: f64,
        cursor: usize,
    }

    impl ScriptedFrameSource {
        pub fn new(width: u32, height: u32, times: Vec<f64>) -> Self {
            let duration = times.last().copied().unwrap_or(0.0);
            Self {
                width,
                height,
                times,
                duration,
                cursor: 0,
            }
        }

        /// `frames` кадров с равным шагом `1 / fps`
        pub fn uniform(width: u32, height: u32, fps: f64, frames: usize) -> Self {
            Self::new(width, height, (0..frames).map(|i| i as f64 / fps).collect())
        }
    }

    impl FrameSource for ScriptedFrameSource {
        fn width(&self) -> u32 {
            self.width
        }

        fn height(&self) -> u32 {
            self.height
        }

        fn fps(&self) -> f64 {
            30.0
        }

        fn duration(&self) -> f64 {
            self.duration
        }

        fn next_frame(&mut self) -> Result<Option<Pixmap>> {
            if self.cursor >= self.times.len() {
                return Ok(None);
            }
            self.cursor += 1;
            let mut pixmap = Pixmap::new(self.width, self.height).ok_or("bad frame size")?;
            pixmap.fill(Color::from_rgba8(20, 40, 60, 255));
            Ok(Some(pixmap))
        }

        fn current_time(&self) -> f64 {
            self.cursor
                .checked_sub(1)
                .and_then(|i| self.times.get(i))
                .copied()
                .unwrap_or(0.0)
        }
    }

    /// Что получил кодировщик
    #[derive(Debug, Default)]
    pub struct Recorded {
        pub specs: Vec<CaptureSpec>,
        pub frames: Vec<Vec<u8>>,
        pub finished: bool,
        pub aborted: bool,
        pub narration_bytes: Option<Vec<u8>>,
    }

    /// Кодировщик в память
    #[derive(Clone)]
    pub struct MemoryBackend {
        pub supported: bool,
        pub recorded: Arc<Mutex<Recorded>>,
    }

    impl MemoryBackend {
        pub fn new(supported: bool) -> Self {
            Self {
                supported,
                recorded: Arc::new(Mutex::new(Recorded::default())),
            }
        }
    }

    impl CaptureBackend for MemoryBackend {
        fn check_capability(&self) -> Result<()> {
            if self.supported {
                Ok(())
            } else {
                Err(ClipSyncError::CapabilityUnsupported("memory backend disabled".to_string()))
            }
        }

        fn open(&self, spec: &CaptureSpec) -> Result<Box<dyn CaptureSink>> {
            let mut recorded = self.recorded.lock();
            recorded.narration_bytes = match &spec.narration {
                Some(path) => Some(std::fs::read(path)?),
                None => None,
            };
            recorded.specs.push(spec.clone());
            Ok(Box::new(MemorySink {
                spec: spec.clone(),
                recorded: Arc::clone(&self.recorded),
            }))
        }
    }

    struct MemorySink {
        spec: CaptureSpec,
        recorded: Arc<Mutex<Recorded>>,
    }

    impl CaptureSink for MemorySink {
        fn write_frame(&mut self, frame: &Pixmap) -> Result<()> {
            self.recorded.lock().frames.push(frame.data().to_vec());
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<ExportArtifact> {
            let mut recorded = self.recorded.lock();
            recorded.finished = true;
            let bytes_written = recorded.frames.iter().map(|f| f.len() as u64).sum();
            Ok(ExportArtifact {
                path: self.spec.output.clone(),
                bytes_written,
                frames: recorded.frames.len() as u64,
                duration: self.spec.duration,
            })
        }

        fn abort(self: Box<Self>) {
            self.recorded.lock().aborted = true;
        }
    }
}
