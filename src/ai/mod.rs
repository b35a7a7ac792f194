//! Модуль генеративного сервиса
//!
//! [`GenerativeService`] закрывает все внешние вызовы: сценарий, речь,
//! видео как длительная операция и скачивание результата.
//! Рабочая реализация [`gemini::GeminiClient`] ходит в REST API Gemini/Veo.

pub mod gemini;
pub mod poller;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{ClipSyncError, Result};
use crate::script::ScriptBeat;

pub use gemini::GeminiClient;
pub use poller::poll_until_done;

/// Параметры генерации видео
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRequest {
    /// Итоговый промпт с префиксом шаблона
    pub prompt: String,
    pub negative_prompt: Option<String>,
    /// `"9:16"`, `"16:9"`
    pub aspect_ratio: String,
    /// `"720p"`, `"1080p"`
    pub resolution: String,
}

/// Опорное изображение персонажа
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceImage {
    /// Base64 без префикса data URL
    pub data: String,
    pub mime_type: String,
}

impl ReferenceImage {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Разобрать `data:image/png;base64,....`
    pub fn from_data_url(url: &str) -> Result<Self> {
        let (header, data) = url
            .split_once(',')
            .ok_or_else(|| ClipSyncError::InvalidFormat("Reference image is not a data URL".to_string()))?;
        let mime_type = header
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .filter(|mime| !mime.is_empty())
            .unwrap_or("image/png");
        if data.is_empty() {
            return Err(ClipSyncError::InvalidFormat("Reference image has no data".to_string()));
        }
        Ok(Self::new(data, mime_type))
    }
}

/// Идентификатор длительной операции генерации видео
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationHandle {
    pub name: String,
}

/// Состояние длительной операции
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationStatus {
    pub done: bool,
    pub error: Option<String>,
    pub result_uri: Option<String>,
}

impl OperationStatus {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn finished(uri: impl Into<String>) -> Self {
        Self {
            done: true,
            error: None,
            result_uri: Some(uri.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            done: true,
            error: Some(message.into()),
            result_uri: None,
        }
    }
}

/// Внешний генеративный сервис
#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// Сценарий по теме. Некорректный JSON в ответе дает пустой вектор.
    async fn generate_script(
        &self,
        topic: &str,
        emotion_goal: &str,
        keywords: &str,
        target_seconds: u32,
    ) -> Result<Vec<ScriptBeat>>;

    /// Речь в base64 PCM16 24 кГц; пустая строка, если аудио нет
    async fn generate_speech(&self, text: &str, voice_name: &str) -> Result<String>;

    async fn generate_video(
        &self,
        request: &VideoRequest,
        reference: Option<&ReferenceImage>,
    ) -> Result<OperationHandle>;

    async fn poll_operation(&self, handle: &OperationHandle) -> Result<OperationStatus>;

    async fn download(&self, uri: &str) -> Result<Bytes>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_image_from_data_url() {
        let image = ReferenceImage::from_data_url("data:image/jpeg;base64,AAAA").unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.data, "AAAA");

        let image = ReferenceImage::from_data_url("data:;base64,BBBB").unwrap();
        assert_eq!(image.mime_type, "image/png");

        assert!(ReferenceImage::from_data_url("AAAA").is_err());
        assert!(ReferenceImage::from_data_url("data:image/png;base64,").is_err());
    }
}
