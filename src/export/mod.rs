//! Модуль экспорта итогового ролика
//!
//! Кадры исходного видео получают вшитые субтитры и вместе с озвучкой
//! уходят в потоковый кодировщик.

pub mod capture;
pub mod compositor;
pub mod ffmpeg_capture;
pub mod session;

pub use capture::{
    default_export_file_name, CaptureBackend, CaptureSink, CaptureSpec, ExportArtifact, ExportProgress, ExportRequest,
    Exporter, FrameSource,
};
pub use compositor::compose_subtitle;
pub use ffmpeg_capture::FfmpegBackend;
pub use session::{ExportEvent, ExportSession, ExportState};
