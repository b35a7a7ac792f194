//! Вспомогательные модули

pub mod ffmpeg;
pub mod temp;

pub use temp::TempFileManager;
