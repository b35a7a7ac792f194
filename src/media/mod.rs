//! Модуль для работы с медиа
//!
//! Дорожка озвучки из PCM16, кодирование WAV и покадровое чтение
//! исходного видео.

pub mod audio;
pub mod video;
pub mod wav;

pub use audio::{AudioTrack, AudioTrackBuilder};
pub use video::{get_video_info, FfmpegFrameSource, VideoInfo};
pub use wav::{decode_wav, encode_wav};
