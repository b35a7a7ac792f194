//! Модуль для работы с временными файлами
//!
//! Скачанное видео и WAV озвучки на время экспорта живут во временной
//! директории, которая удаляется вместе с менеджером.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::TempDir;

use crate::error::Result;

/// Менеджер временных файлов
pub struct TempFileManager {
    temp_dir: TempDir,
    files: Vec<PathBuf>,
    cleanup: bool,
}

impl TempFileManager {
    pub fn new(cleanup: bool) -> Result<Self> {
        Ok(Self {
            temp_dir: tempfile::Builder::new().prefix("clip-sync").tempdir()?,
            files: Vec::new(),
            cleanup,
        })
    }

    /// Уникальный путь внутри временной директории, файл не создается
    pub fn temp_path(&mut self, prefix: &str, extension: &str) -> PathBuf {
        let file_name = format!("{}_{}.{}", prefix, uuid::Uuid::new_v4(), extension);
        let path = self.temp_dir.path().join(file_name);
        self.files.push(path.clone());
        path
    }

    /// Записать байты во временный файл
    pub fn write_temp_file(&mut self, prefix: &str, extension: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.temp_path(prefix, extension);
        fs::write(&path, contents)?;
        debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(path)
    }

    pub fn temp_dir_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Удалить созданные файлы, если включена очистка
    pub fn cleanup(&mut self) -> Result<()> {
        if self.cleanup {
            for file in self.files.drain(..) {
                if file.exists() {
                    fs::remove_file(&file)?;
                }
            }
        }
        Ok(())
    }
}

impl Drop for TempFileManager {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
