//! Модуль для работы с видео
//!
//! Параметры исходного ролика через ffprobe и покадровое чтение через
//! ffmpeg (`rawvideo`, RGBA) для экспорта.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use log::{debug, warn};
use serde::Deserialize;
use tiny_skia::{IntSize, Pixmap};

use crate::error::{ClipSyncError, Result};
use crate::export::capture::FrameSource;
use crate::utils::ffmpeg::run_ffprobe_command;

/// Информация о видео
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Длительность в секундах
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Получение информации о видео
pub fn get_video_info<P: AsRef<Path>>(ffprobe: &str, video_path: P) -> Result<VideoInfo> {
    let path = video_path.as_ref().to_string_lossy().to_string();
    let json = run_ffprobe_command(
        ffprobe,
        &[
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate:format=duration",
            "-of",
            "json",
            &path,
        ],
    )?;
    parse_probe_output(&json)
}

fn parse_probe_output(json: &str) -> Result<VideoInfo> {
    let probe: ProbeOutput = serde_json::from_str(json)?;
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| ClipSyncError::VideoProcessing("No video stream found".to_string()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(ClipSyncError::VideoProcessing(
                "Failed to read video resolution".to_string(),
            ))
        }
    };

    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .ok_or_else(|| ClipSyncError::VideoProcessing("Failed to parse video fps".to_string()))?;

    let duration = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoInfo {
        duration,
        width,
        height,
        fps,
    })
}

/// `"30000/1001"` или `"24"`
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num.trim().parse::<f64>().ok()? / den
        }
        None => rate.trim().parse::<f64>().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Покадровое чтение видео через дочерний процесс ffmpeg.
///
/// Время кадра равно `index / fps`: кадры читаются быстрее реального
/// времени, поэтому часы источника определяются номером кадра.
pub struct FfmpegFrameSource {
    info: VideoInfo,
    child: Child,
    stdout: ChildStdout,
    frame_index: u64,
    path: PathBuf,
}

impl FfmpegFrameSource {
    pub fn open<P: AsRef<Path>>(ffmpeg: &str, ffprobe: &str, video_path: P) -> Result<Self> {
        let path = video_path.as_ref().to_path_buf();
        let info = get_video_info(ffprobe, &path)?;
        let mut child = Command::new(ffmpeg)
            .args(["-v", "error", "-i"])
            .arg(&path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgba", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClipSyncError::VideoProcessing("FFmpeg stdout is not available".to_string()))?;

        debug!(
            "Decoding {} ({}x{} @ {:.2} fps, {:.2}s)",
            path.display(),
            info.width,
            info.height,
            info.fps,
            info.duration
        );
        Ok(Self {
            info,
            child,
            stdout,
            frame_index: 0,
            path,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }
}

impl FrameSource for FfmpegFrameSource {
    fn width(&self) -> u32 {
        self.info.width
    }

    fn height(&self) -> u32 {
        self.info.height
    }

    fn fps(&self) -> f64 {
        self.info.fps
    }

    fn duration(&self) -> f64 {
        self.info.duration
    }

    fn current_time(&self) -> f64 {
        self.frame_index.saturating_sub(1) as f64 / self.info.fps
    }

    fn next_frame(&mut self) -> Result<Option<Pixmap>> {
        let frame_len = self.info.width as usize * self.info.height as usize * 4;
        let mut data = vec![0u8; frame_len];
        match self.stdout.read_exact(&mut data) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("End of {} after {} frames", self.path.display(), self.frame_index);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }
        self.frame_index += 1;

        let size = IntSize::from_wh(self.info.width, self.info.height)
            .ok_or_else(|| ClipSyncError::VideoProcessing("Invalid frame size".to_string()))?;
        Pixmap::from_vec(data, size)
            .map(Some)
            .ok_or_else(|| ClipSyncError::VideoProcessing("Failed to wrap decoded frame".to_string()))
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            if let Err(e) = self.child.kill() {
                warn!("Failed to stop ffmpeg decoder: {}", e);
            }
        }
        let _ = self.child.wait();
    }
}
