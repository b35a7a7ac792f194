//! Кодирование кадров через дочерний процесс ffmpeg
//!
//! Кадры RGBA пишутся в stdin, озвучка подключается вторым входом.
//! Результат заканчивается вместе с кадрами: stdin закрывается в конце
//! источника, а озвучка дополняется тишиной и обрезается по видео.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};

use log::{debug, warn};
use tiny_skia::Pixmap;

use crate::config::ExportSettings;
use crate::error::{ClipSyncError, Result};
use crate::export::capture::{CaptureBackend, CaptureSink, CaptureSpec, ExportArtifact};
use crate::utils::ffmpeg::{check_ffmpeg_installed, list_encoders};

/// Бэкенд экспорта на ffmpeg
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    settings: ExportSettings,
}

impl FfmpegBackend {
    pub fn new(settings: ExportSettings) -> Self {
        Self { settings }
    }

    fn unsupported(&self) -> ClipSyncError {
        ClipSyncError::CapabilityUnsupported(format!(
            "streaming capture requires FFmpeg with {} and {} encoders",
            self.settings.video_codec, self.settings.audio_codec
        ))
    }
}

impl CaptureBackend for FfmpegBackend {
    fn check_capability(&self) -> Result<()> {
        if !check_ffmpeg_installed(&self.settings.ffmpeg_path)? {
            return Err(self.unsupported());
        }
        let encoders = list_encoders(&self.settings.ffmpeg_path)?;
        let has = |name: &str| encoders.iter().any(|e| e == name);
        if has(&self.settings.video_codec) && has(&self.settings.audio_codec) {
            Ok(())
        } else {
            Err(self.unsupported())
        }
    }

    fn open(&self, spec: &CaptureSpec) -> Result<Box<dyn CaptureSink>> {
        let args = encoder_args(&self.settings, spec);
        debug!("Starting encoder: {} {}", self.settings.ffmpeg_path, args.join(" "));
        Ok(Box::new(FfmpegSink::spawn(&self.settings.ffmpeg_path, &args, spec)?))
    }
}

/// Аргументы ffmpeg для потока кадров `spec`
fn encoder_args(settings: &ExportSettings, spec: &CaptureSpec) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "-s".into(),
        format!("{}x{}", spec.width, spec.height),
        "-r".into(),
        format!("{}", spec.fps),
        "-i".into(),
        "-".into(),
    ];
    if let Some(narration) = &spec.narration {
        args.push("-i".into());
        args.push(narration.to_string_lossy().to_string());
    }
    args.extend(["-map".into(), "0:v".into()]);
    if spec.narration.is_some() {
        args.extend([
            "-map".into(),
            "1:a".into(),
            "-af".into(),
            "apad".into(),
            "-c:a".into(),
            settings.audio_codec.clone(),
        ]);
    }
    args.extend([
        "-c:v".into(),
        settings.video_codec.clone(),
        "-b:v".into(),
        settings.video_bitrate.to_string(),
    ]);
    if spec.narration.is_some() {
        // Дополненная тишиной озвучка бесконечна, поток режется по видео
        args.push("-shortest".into());
    }
    args.extend([
        "-f".into(),
        settings.container.clone(),
        "-y".into(),
        spec.output.to_string_lossy().to_string(),
    ]);
    args
}

/// Сколько последних байт журнала ffmpeg попадает в текст ошибки
const ENCODER_LOG_TAIL: u64 = 4096;

struct FfmpegSink {
    child: Child,
    stdin: Option<ChildStdin>,
    /// stderr кодировщика пишется во временный файл, а не в канал
    log: File,
    output: PathBuf,
    frame_len: usize,
    frames: u64,
    fps: f64,
}

impl FfmpegSink {
    fn spawn(program: &str, args: &[String], spec: &CaptureSpec) -> Result<Self> {
        let log = tempfile::tempfile()?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log.try_clone()?))
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClipSyncError::VideoProcessing("FFmpeg stdin is not available".to_string()))?;

        Ok(Self {
            child,
            stdin: Some(stdin),
            log,
            output: spec.output.clone(),
            frame_len: spec.width as usize * spec.height as usize * 4,
            frames: 0,
            fps: spec.fps,
        })
    }
}

/// Хвост журнала кодировщика
fn read_log_tail(log: &mut File) -> String {
    match tail(log) {
        Ok(text) => text,
        Err(e) => format!("encoder log is unavailable: {}", e),
    }
}

fn tail(log: &mut File) -> std::io::Result<String> {
    let len = log.seek(SeekFrom::End(0))?;
    log.seek(SeekFrom::Start(len.saturating_sub(ENCODER_LOG_TAIL)))?;
    let mut bytes = Vec::new();
    log.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).trim().to_string())
}

impl CaptureSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Pixmap) -> Result<()> {
        if frame.data().len() != self.frame_len {
            return Err(ClipSyncError::VideoProcessing(format!(
                "Frame size mismatch: expected {} bytes, got {}",
                self.frame_len,
                frame.data().len()
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ClipSyncError::VideoProcessing("Encoder input is closed".to_string()))?;
        stdin.write_all(frame.data())?;
        self.frames += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<ExportArtifact> {
        let FfmpegSink {
            mut child,
            stdin,
            mut log,
            output,
            frames,
            fps,
            ..
        } = *self;
        drop(stdin);

        let status = child.wait()?;
        if !status.success() {
            let _ = fs::remove_file(&output);
            return Err(ClipSyncError::VideoProcessing(format!(
                "FFmpeg encoder failed with status {}: {}",
                status,
                read_log_tail(&mut log)
            )));
        }
        let bytes_written = fs::metadata(&output)?.len();
        let duration = if fps > 0.0 { frames as f64 / fps } else { 0.0 };
        debug!("Encoder wrote {} frames, {} bytes", frames, bytes_written);
        Ok(ExportArtifact {
            path: output,
            bytes_written,
            frames,
            duration,
        })
    }

    fn abort(mut self: Box<Self>) {
        drop(self.stdin.take());
        if let Err(e) = self.child.kill() {
            warn!("Failed to stop ffmpeg encoder: {}", e);
        }
        let _ = self.child.wait();
        if self.output.exists() {
            if let Err(e) = fs::remove_file(&self.output) {
                warn!("Failed to remove partial export {}: {}", self.output.display(), e);
            }
        }
    }
}
