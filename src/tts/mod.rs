//! Модуль для работы с TTS
//!
//! Озвучка сценария по битам и кэш синтезированной речи.

pub mod cache;
pub mod voiceover;

pub use cache::SpeechCache;
pub use voiceover::{synthesize_voiceover, Voiceover};
