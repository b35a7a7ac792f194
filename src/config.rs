//! Модуль конфигурации библиотеки clip-sync
//!
//! Этот модуль содержит структуры и перечисления для настройки библиотеки,
//! а также встроенные каталоги голосов и шаблонов видео.

use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::{ClipSyncError, Result};

/// Частота дискретизации речи, которую возвращает сервис TTS
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

/// Голос для использования с сервисом синтеза речи
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TtsVoice {
    /// Голос Kore
    Kore,
    /// Голос Puck
    Puck,
    /// Голос Charon
    Charon,
    /// Голос Fenrir
    Fenrir,
    /// Голос Zephyr
    Zephyr,
}

impl Default for TtsVoice {
    fn default() -> Self {
        Self::Kore
    }
}

impl TtsVoice {
    /// Получить строковое представление голоса
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kore => "Kore",
            Self::Puck => "Puck",
            Self::Charon => "Charon",
            Self::Fenrir => "Fenrir",
            Self::Zephyr => "Zephyr",
        }
    }
}

/// Пол диктора в пресете
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    Male,
    Female,
}

/// Пресет голоса, доступный для выбора в проекте
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoicePreset {
    pub id: &'static str,
    pub name: &'static str,
    pub gender: VoiceGender,
    pub style: &'static str,
    pub voice: TtsVoice,
}

/// Шаблон видео: префикс, который добавляется к промпту пользователя
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VideoTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub prompt_prefix: &'static str,
}

pub const VOICE_PRESETS: &[VoicePreset] = &[
    VoicePreset { id: "v1", name: "Nam MC Tin Tức", gender: VoiceGender::Male, style: "Chuyên nghiệp, đĩnh đạc", voice: TtsVoice::Kore },
    VoicePreset { id: "v2", name: "Nữ Thuyết Minh", gender: VoiceGender::Female, style: "Truyền cảm, ấm áp", voice: TtsVoice::Puck },
    VoicePreset { id: "v3", name: "Nam Diễn Giả", gender: VoiceGender::Male, style: "Năng lượng, truyền cảm hứng", voice: TtsVoice::Charon },
    VoicePreset { id: "v4", name: "Nữ Reviewer", gender: VoiceGender::Female, style: "Trẻ trung, năng động", voice: TtsVoice::Zephyr },
    VoicePreset { id: "v5", name: "Giọng Kể Chuyện", gender: VoiceGender::Male, style: "Huyền bí, trầm ấm", voice: TtsVoice::Fenrir },
    VoicePreset { id: "v6", name: "Nữ Thời Trang", gender: VoiceGender::Female, style: "Sang trọng, lôi cuốn", voice: TtsVoice::Zephyr },
    VoicePreset { id: "v7", name: "Nam Podcast", gender: VoiceGender::Male, style: "Thân thiện, gần gũi", voice: TtsVoice::Kore },
];

pub const VIDEO_TEMPLATES: &[VideoTemplate] = &[
    VideoTemplate {
        id: "super_realistic",
        name: "Siêu Thực Tế (Super Realistic)",
        description: "Chuyển động mượt mà, ánh sáng CGI đỉnh cao, chất lượng như ảnh chụp.",
        prompt_prefix: "hyper-realistic 8k video, cinematic lighting, ultra-detailed texture, smooth motion, professional CGI, photorealistic masterpiece, ",
    },
    VideoTemplate {
        id: "cyberpunk_glitch",
        name: "Cyberpunk Glitch",
        description: "Phong cách tương lai với hiệu ứng lỗi kỹ thuật, neon bloom và quang sai màu.",
        prompt_prefix: "cyberpunk glitch aesthetic, neon lights, chromatic aberration, digital distortion, future city, flickering neon, ",
    },
    VideoTemplate {
        id: "product_ad",
        name: "Quảng Cáo Sản Phẩm AI",
        description: "Tập trung vào chi tiết, chuyển động quay chậm sang trọng cho sản phẩm.",
        prompt_prefix: "luxury product commercial, slow motion, elegant lighting, studio background, 4k macro shot, sleek presentation, ",
    },
    VideoTemplate {
        id: "fashion_accessory",
        name: "Thời Trang Phụ Kiện",
        description: "Sống động, bắt mắt, phù hợp với xu hướng TikTok Fashion.",
        prompt_prefix: "dynamic fashion showcase, high speed cuts, stylish models, trendy accessories, vibrant colors, runway style, ",
    },
    VideoTemplate {
        id: "kids_cartoon",
        name: "Trò Chơi Hoạt Hình",
        description: "Màu sắc rực rỡ, nhân vật đáng yêu, chuyển động vui nhộn cho trẻ em.",
        prompt_prefix: "3d animation for children, cute characters, bright vivid colors, playful atmosphere, Disney Pixar style, ",
    },
];

pub const EMOTION_GOALS: &[&str] = &[
    "Hồi hộp đến Chiến thắng",
    "Hài hước đến Cung cấp thông tin",
    "Cảm động & Sâu sắc",
    "Năng lượng & Động lực",
    "Bí ẩn & Tò mò",
    "Sang trọng & Đẳng cấp",
];

/// Найти пресет голоса по идентификатору, иначе первый пресет
pub fn find_voice_preset(id: &str) -> &'static VoicePreset {
    VOICE_PRESETS
        .iter()
        .find(|preset| preset.id == id)
        .unwrap_or(&VOICE_PRESETS[0])
}

/// Найти шаблон видео по идентификатору
pub fn find_video_template(id: &str) -> Option<&'static VideoTemplate> {
    VIDEO_TEMPLATES.iter().find(|template| template.id == id)
}

/// Политика опроса статуса длительной операции
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollPolicy {
    /// Начальный интервал между запросами, мс
    pub interval_ms: u64,
    /// Множитель экспоненциальной задержки
    pub backoff_factor: f64,
    /// Верхняя граница интервала, мс
    pub max_interval_ms: u64,
    /// Максимальное число запросов статуса
    pub max_attempts: u32,
    /// Жесткий лимит на всю операцию, мс
    pub timeout_ms: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            backoff_factor: 1.5,
            max_interval_ms: 30_000,
            max_attempts: 120,
            timeout_ms: 15 * 60 * 1_000,
        }
    }
}

impl PollPolicy {
    /// Задержка перед попыткой с номером `attempt` (с нуля)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.interval_ms as f64 * self.backoff_factor.max(1.0).powi(attempt as i32);
        let capped = base.min(self.max_interval_ms.max(self.interval_ms) as f64);
        Duration::from_millis(capped as u64)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Параметры кодирования итогового видео
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportSettings {
    /// Путь к ffmpeg
    pub ffmpeg_path: String,
    /// Путь к ffprobe
    pub ffprobe_path: String,
    /// Видеокодек
    pub video_codec: String,
    /// Аудиокодек
    pub audio_codec: String,
    /// Формат контейнера
    pub container: String,
    /// Битрейт видео, бит/с
    pub video_bitrate: u64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            video_codec: "libvpx-vp9".to_string(),
            audio_codec: "libopus".to_string(),
            container: "webm".to_string(),
            video_bitrate: 8_000_000,
        }
    }
}

/// Геометрия субтитров относительно кадра
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubtitleMetrics {
    /// Доля ширины кадра, которую не может превысить строка
    pub wrap_fraction: f32,
    /// Межстрочный интервал в долях размера шрифта
    pub line_height: f32,
    /// Размер шрифта в долях короткой стороны кадра
    pub font_scale: f32,
    /// Вертикальный якорь блока в долях высоты кадра
    pub anchor: f32,
    /// TTF/OTF файл обычного начертания
    pub font_path: Option<String>,
    /// TTF/OTF файл жирного начертания
    pub bold_font_path: Option<String>,
}

impl Default for SubtitleMetrics {
    fn default() -> Self {
        Self {
            wrap_fraction: 0.85,
            line_height: 1.2,
            font_scale: 0.065,
            anchor: 0.78,
            font_path: None,
            bold_font_path: None,
        }
    }
}

/// Как согласовывать длительность битов с реальной длиной речи
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimelineSync {
    /// Субтитры идут по номинальным длительностям сценария
    Nominal,
    /// Длительности битов переписываются по длине синтезированной речи
    FollowSpeech,
}

impl Default for TimelineSync {
    fn default() -> Self {
        Self::Nominal
    }
}

/// Конфигурация библиотеки
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipSyncConfig {
    /// API ключ генеративного сервиса
    pub api_key: String,
    /// Базовый URL REST API
    pub api_base_url: String,
    /// Модель для сценариев
    pub script_model: String,
    /// Модель синтеза речи
    pub speech_model: String,
    /// Модель генерации видео
    pub video_model: String,
    /// Частота дискретизации речи
    pub sample_rate: u32,
    /// Максимальное количество одновременных запросов синтеза речи
    pub max_concurrent_requests: usize,
    /// Таймаут одного HTTP запроса, секунды
    pub request_timeout_secs: u64,
    /// Опрос статуса генерации видео
    pub poll: PollPolicy,
    /// Экспорт
    pub export: ExportSettings,
    /// Субтитры
    pub subtitles: SubtitleMetrics,
    /// Согласование таймлайна
    pub timeline_sync: TimelineSync,
    /// Использовать кэширование речи
    pub use_caching: bool,
    /// Директория для кэша
    pub cache_dir: Option<String>,
    /// Максимальный размер кэша в байтах
    pub max_cache_size: Option<u64>,
    /// Удалять временные файлы после завершения
    pub cleanup_temp_files: bool,
}

impl Default for ClipSyncConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            script_model: "gemini-3-flash-preview".to_string(),
            speech_model: "gemini-2.5-flash-preview-tts".to_string(),
            video_model: "veo-3.1-fast-generate-preview".to_string(),
            sample_rate: SPEECH_SAMPLE_RATE,
            max_concurrent_requests: 1,
            request_timeout_secs: 120,
            poll: PollPolicy::default(),
            export: ExportSettings::default(),
            subtitles: SubtitleMetrics::default(),
            timeline_sync: TimelineSync::default(),
            use_caching: true,
            cache_dir: None,
            max_cache_size: Some(256 * 1024 * 1024), // 256 MB
            cleanup_temp_files: true,
        }
    }
}

impl ClipSyncConfig {
    /// Конфигурация по умолчанию с ключом из `GEMINI_API_KEY` или `API_KEY`
    pub fn from_env() -> Self {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .unwrap_or_default();
        Self {
            api_key,
            ..Self::default()
        }
    }

    /// Проверить согласованность настроек
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ClipSyncError::Configuration("sample_rate must be positive".to_string()));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ClipSyncError::Configuration(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.subtitles.wrap_fraction) || self.subtitles.wrap_fraction == 0.0 {
            return Err(ClipSyncError::Configuration(format!(
                "wrap_fraction must be in (0, 1], got {}",
                self.subtitles.wrap_fraction
            )));
        }
        if self.poll.max_attempts == 0 {
            return Err(ClipSyncError::Configuration("poll.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}
