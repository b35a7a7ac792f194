//! Наблюдатели прогресса
//!
//! Готовые реализации [`ProgressObserver`]: журнал, память, канал tokio,
//! замыкание и их композиция.

use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::progress::{ProgressInfo, ProgressObserver};

/// Пишет прогресс в журнал на уровне `info`
pub struct LogProgressObserver {
    prefix: Option<String>,
}

impl LogProgressObserver {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl Default for LogProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for LogProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let prefix = self.prefix.as_deref().unwrap_or("");
        match progress.details.as_deref() {
            Some(details) if !details.is_empty() => info!(
                "{}{}: {:.0}% (total {:.0}%) {}",
                prefix, progress.step, progress.step_progress, progress.total_progress, details
            ),
            _ => info!(
                "{}{}: {:.0}% (total {:.0}%)",
                prefix, progress.step, progress.step_progress, progress.total_progress
            ),
        }
    }
}

/// Хранит историю обновлений; клоны разделяют одну историю
#[derive(Clone, Default)]
pub struct MemoryProgressObserver {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl MemoryProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<ProgressInfo> {
        self.history.lock().clone()
    }

    pub fn last(&self) -> Option<ProgressInfo> {
        self.history.lock().last().cloned()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        self.history.lock().push(progress);
    }
}

/// Пересылает обновления в канал tokio.
///
/// Если получатель не успевает и канал полон, обновление теряется.
pub struct ChannelProgressObserver {
    sender: mpsc::Sender<ProgressInfo>,
}

impl ChannelProgressObserver {
    pub fn new(sender: mpsc::Sender<ProgressInfo>) -> Self {
        Self { sender }
    }
}

impl ProgressObserver for ChannelProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        if let Err(e) = self.sender.try_send(progress) {
            warn!("Dropping progress update: {}", e);
        }
    }
}

/// Вызывает замыкание на каждое обновление
pub struct CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    callback: F,
}

impl<F> CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressObserver for CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    fn on_progress_update(&self, progress: ProgressInfo) {
        (self.callback)(progress);
    }
}

/// Рассылает обновление нескольким наблюдателям
#[derive(Default)]
pub struct CompositeProgressObserver {
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl CompositeProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl ProgressObserver for CompositeProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        for observer in &self.observers {
            observer.on_progress_update(progress.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_memory_observer() {
        let observer = MemoryProgressObserver::new();
        observer.on_progress_update(ProgressInfo::new("Генерация видео", 50.0, 35.0, None));
        observer.on_progress_update(ProgressInfo::new("Синтез озвучки", 10.0, 67.0, None));

        let history = observer.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].step, "Генерация видео");
        assert_eq!(observer.last().map(|p| p.total_progress), Some(67.0));

        observer.clear_history();
        assert!(observer.history().is_empty());
    }

    #[tokio::test]
    async fn test_channel_observer() {
        let (tx, mut rx) = mpsc::channel(4);
        let observer = ChannelProgressObserver::new(tx);
        observer.on_progress_update(ProgressInfo::new("Экспорт ролика", 40.0, 91.0, None));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.step_progress, 40.0);
    }

    #[test]
    fn test_channel_observer_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let observer = ChannelProgressObserver::new(tx);
        observer.on_progress_update(ProgressInfo::new("a", 1.0, 1.0, None));
        observer.on_progress_update(ProgressInfo::new("b", 2.0, 2.0, None));

        assert_eq!(rx.try_recv().unwrap().step, "a");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_composite_observer() {
        let memory = MemoryProgressObserver::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let mut composite = CompositeProgressObserver::new();
        composite.add_observer(Box::new(memory.clone()));
        composite.add_observer(Box::new(CallbackProgressObserver::new(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })));
        composite.add_observer(Box::new(LogProgressObserver::with_prefix("[test] ")));

        composite.on_progress_update(ProgressInfo::new("Генерация сценария", 100.0, 5.0, None));

        assert_eq!(composite.len(), 3);
        assert_eq!(memory.history().len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
