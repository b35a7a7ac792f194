//! Кэш синтезированной речи
//!
//! Ключ: md5 от текста бита и имени голоса. Значение: base64 PCM16,
//! как его вернул сервис. Записи живут в памяти и, если задана
//! директория, дублируются на диск файлами `<key>.b64`.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::config::ClipSyncConfig;
use crate::error::Result;

pub struct SpeechCache {
    cache_dir: Option<PathBuf>,
    max_size: Option<u64>,
    entries: Mutex<HashMap<String, String>>,
}

impl SpeechCache {
    /// Кэш на диске по настройкам; директория создается при необходимости
    pub fn new(config: &ClipSyncConfig) -> Result<Self> {
        let cache_dir = match &config.cache_dir {
            Some(dir) => PathBuf::from(dir),
            None => std::env::temp_dir().join("clip-sync-cache"),
        };
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }

        Ok(Self {
            cache_dir: Some(cache_dir),
            max_size: config.max_cache_size,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Кэш только в памяти процесса
    pub fn in_memory() -> Self {
        Self {
            cache_dir: None,
            max_size: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache_key(text: &str, voice: &str) -> String {
        let mut hasher = md5::Context::new();
        hasher.consume(text.as_bytes());
        // Разделитель: пары ("ab", "c") и ("a", "bc") дают разные ключи
        hasher.consume([0u8]);
        hasher.consume(voice.as_bytes());
        format!("{:x}", hasher.compute())
    }

    pub fn get(&self, text: &str, voice: &str) -> Option<String> {
        let key = Self::cache_key(text, voice);
        if let Some(payload) = self.entries.lock().get(&key) {
            return Some(payload.clone());
        }

        let path = self.cache_dir.as_ref()?.join(format!("{}.b64", key));
        match fs::read_to_string(&path) {
            Ok(payload) => {
                debug!("Speech cache hit on disk: {}", path.display());
                self.entries.lock().insert(key, payload.clone());
                Some(payload)
            }
            Err(_) => None,
        }
    }

    /// Сохранить непустой фрагмент речи
    pub fn insert(&self, text: &str, voice: &str, payload: &str) -> Result<()> {
        if payload.is_empty() {
            return Ok(());
        }
        let key = Self::cache_key(text, voice);
        if let Some(dir) = &self.cache_dir {
            fs::write(dir.join(format!("{}.b64", key)), payload)?;
            self.check_cache_size()?;
        }
        self.entries.lock().insert(key, payload.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) -> Result<()> {
        if let Some(dir) = &self.cache_dir {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    fs::remove_file(entry.path())?;
                }
            }
        }
        self.entries.lock().clear();
        Ok(())
    }

    /// Удалять самые старые файлы, пока кэш не уложится в лимит
    fn check_cache_size(&self) -> Result<()> {
        let (Some(dir), Some(max_size)) = (&self.cache_dir, self.max_size) else {
            return Ok(());
        };

        let mut total_size = 0;
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let metadata = entry.metadata()?;
                total_size += metadata.len();
                files.push((entry.path(), metadata.len(), metadata.modified()?));
            }
        }
        if total_size <= max_size {
            return Ok(());
        }

        files.sort_by(|a, b| a.2.cmp(&b.2));
        let mut entries = self.entries.lock();
        for (path, len, _) in files {
            if total_size <= max_size {
                break;
            }
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to evict {}: {}", path.display(), e);
                continue;
            }
            total_size -= len;
            if let Some(key) = path.file_stem().and_then(|s| s.to_str()) {
                entries.remove(key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_depends_on_voice() {
        assert_ne!(SpeechCache::cache_key("Xin chào", "Kore"), SpeechCache::cache_key("Xin chào", "Puck"));
        assert_eq!(SpeechCache::cache_key("a", "Kore"), SpeechCache::cache_key("a", "Kore"));
    }

    #[test]
    fn test_key_separates_text_from_voice() {
        assert_ne!(SpeechCache::cache_key("ab", "c"), SpeechCache::cache_key("a", "bc"));
        assert_ne!(SpeechCache::cache_key("Xin chàoK", "ore"), SpeechCache::cache_key("Xin chào", "Kore"));
    }

    #[test]
    fn test_memory_cache() {
        let cache = SpeechCache::in_memory();
        assert!(cache.get("Xin chào", "Kore").is_none());
        cache.insert("Xin chào", "Kore", "AAAA").unwrap();
        cache.insert("empty", "Kore", "").unwrap();
        assert_eq!(cache.get("Xin chào", "Kore").as_deref(), Some("AAAA"));
        assert!(cache.get("Xin chào", "Puck").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_disk_cache_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClipSyncConfig {
            cache_dir: Some(dir.path().to_string_lossy().to_string()),
            ..ClipSyncConfig::default()
        };

        SpeechCache::new(&config).unwrap().insert("beat", "Kore", "BBBB").unwrap();
        let reopened = SpeechCache::new(&config).unwrap();
        assert_eq!(reopened.get("beat", "Kore").as_deref(), Some("BBBB"));

        reopened.clear().unwrap();
        assert!(reopened.get("beat", "Kore").is_none());
    }

    #[test]
    fn test_size_limit_evicts_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClipSyncConfig {
            cache_dir: Some(dir.path().to_string_lossy().to_string()),
            max_cache_size: Some(10),
            ..ClipSyncConfig::default()
        };
        let cache = SpeechCache::new(&config).unwrap();
        cache.insert("one", "Kore", "12345678").unwrap();
        cache.insert("two", "Kore", "87654321").unwrap();

        let files = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 1);
    }
}
