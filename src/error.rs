//! Модуль обработки ошибок библиотеки clip-sync
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при работе библиотеки.
//! Все ошибки сводятся к человекочитаемым сообщениям: структурированных кодов нет.

use thiserror::Error;

/// Подстрока, по которой сервис сообщает об отсутствующем или отозванном ключе
pub const MISSING_CREDENTIAL_MARKER: &str = "Requested entity was not found";

/// Ошибки библиотеки clip-sync
#[derive(Debug, Error)]
pub enum ClipSyncError {
    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка WAV-кодирования
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Внешний сервис вернул ошибку (сообщение передается как есть)
    #[error("{0}")]
    Upstream(String),

    /// Ключ API отклонен, нужна повторная авторизация
    #[error("Missing or rejected API credential: {0}")]
    MissingCredential(String),

    /// Среда выполнения не умеет захватывать и кодировать поток
    #[error("Capture is not supported: {0}")]
    CapabilityUnsupported(String),

    /// Операция не завершилась за отведенное время
    #[error("Timed out: {0}")]
    TimedOut(String),

    /// Операция отменена вызывающей стороной
    #[error("Operation cancelled")]
    Cancelled,

    /// Ошибка обработки аудио
    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    /// Ошибка обработки видео
    #[error("Video processing error: {0}")]
    VideoProcessing(String),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Неверный формат
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Недопустимый переход сеанса экспорта
    #[error("Invalid export state: {0}")]
    InvalidState(String),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ClipSyncError {
    /// Классифицировать сообщение внешнего сервиса
    ///
    /// Сообщения с маркером отсутствующего ключа превращаются в
    /// `MissingCredential`, остальные остаются `Upstream`.
    pub fn from_upstream(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains(MISSING_CREDENTIAL_MARKER) {
            ClipSyncError::MissingCredential(message)
        } else {
            ClipSyncError::Upstream(message)
        }
    }

    /// Требует ли ошибка повторной авторизации
    pub fn is_missing_credential(&self) -> bool {
        matches!(self, ClipSyncError::MissingCredential(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClipSyncError::Cancelled)
    }
}

impl From<&str> for ClipSyncError {
    fn from(s: &str) -> Self {
        ClipSyncError::Other(anyhow::anyhow!(s.to_string()))
    }
}

impl From<String> for ClipSyncError {
    fn from(s: String) -> Self {
        ClipSyncError::Other(anyhow::anyhow!(s))
    }
}

/// Тип Result для библиотеки clip-sync
pub type Result<T> = std::result::Result<T, ClipSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_classification() {
        let err = ClipSyncError::from_upstream("Requested entity was not found.");
        assert!(err.is_missing_credential());

        let err = ClipSyncError::from_upstream("quota exceeded");
        assert!(!err.is_missing_credential());
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[test]
    fn test_cancelled_predicate() {
        assert!(ClipSyncError::Cancelled.is_cancelled());
        assert!(!ClipSyncError::TimedOut("poll".into()).is_cancelled());
    }
}
