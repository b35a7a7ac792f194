//! Модуль для отслеживания прогресса выполнения операций
//!
//! Наблюдатели получают [`ProgressInfo`] при каждом изменении этапа или
//! прогресса внутри этапа. Общий прогресс считается по весам этапов
//! производства ролика.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Информация о прогрессе выполнения операции
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressInfo {
    /// Текущий этап операции
    pub step: String,
    /// Процент выполнения текущего этапа (0.0 - 100.0)
    pub step_progress: f32,
    /// Общий процент выполнения всей операции (0.0 - 100.0)
    pub total_progress: f32,
    /// Дополнительная информация о текущем этапе
    pub details: Option<String>,
}

impl ProgressInfo {
    pub fn new(step: impl Into<String>, step_progress: f32, total_progress: f32, details: Option<String>) -> Self {
        Self {
            step: step.into(),
            step_progress: step_progress.clamp(0.0, 100.0),
            total_progress: total_progress.clamp(0.0, 100.0),
            details,
        }
    }
}

/// Наблюдатель, получающий уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Объект, рассылающий уведомления о прогрессе
pub trait ProgressReporter: Send + Sync {
    /// Добавить наблюдателя, вернуть его идентификатор
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize;

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>>;

    fn notify_progress(&self, progress: ProgressInfo);
}

/// Синхронная рассылка по списку наблюдателей
pub struct DefaultProgressReporter {
    observers: RwLock<HashMap<usize, Box<dyn ProgressObserver>>>,
    next_id: AtomicUsize,
}

impl DefaultProgressReporter {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl Default for DefaultProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for DefaultProgressReporter {
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers.write().insert(id, observer);
        id
    }

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        self.observers.write().remove(&id)
    }

    fn notify_progress(&self, progress: ProgressInfo) {
        for observer in self.observers.read().values() {
            observer.on_progress_update(progress.clone());
        }
    }
}

/// Этапы производства ролика
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessStep {
    /// Генерация сценария
    ScriptGeneration,
    /// Генерация видео и ожидание длительной операции
    VideoGeneration,
    /// Синтез озвучки по битам
    SpeechSynthesis,
    /// Захват и кодирование итогового файла
    Export,
}

impl ProcessStep {
    pub const ALL: [ProcessStep; 4] = [
        Self::ScriptGeneration,
        Self::VideoGeneration,
        Self::SpeechSynthesis,
        Self::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScriptGeneration => "Генерация сценария",
            Self::VideoGeneration => "Генерация видео",
            Self::SpeechSynthesis => "Синтез озвучки",
            Self::Export => "Экспорт ролика",
        }
    }

    /// Весовой коэффициент этапа в процентах от всего процесса
    pub fn weight(&self) -> f32 {
        match self {
            Self::ScriptGeneration => 5.0,
            Self::VideoGeneration => 60.0,
            Self::SpeechSynthesis => 20.0,
            Self::Export => 15.0,
        }
    }
}

#[derive(Debug)]
struct TrackerState {
    current_step: ProcessStep,
    step_progress: f32,
    total_progress: f32,
    completed_steps: HashMap<ProcessStep, f32>,
}

impl TrackerState {
    fn recompute_total(&mut self) {
        let all: f32 = ProcessStep::ALL.iter().map(|s| s.weight()).sum();
        let mut done: f32 = self
            .completed_steps
            .iter()
            .filter(|(step, _)| **step != self.current_step)
            .map(|(step, progress)| step.weight() * progress / 100.0)
            .sum();
        done += self.current_step.weight() * self.step_progress / 100.0;
        self.total_progress = (done / all * 100.0).clamp(0.0, 100.0);
    }
}

/// Трекер прогресса, разделяемый между задачами
pub struct ProgressTracker {
    reporter: Option<Box<dyn ProgressReporter>>,
    state: RwLock<TrackerState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            reporter: None,
            state: RwLock::new(TrackerState {
                current_step: ProcessStep::ScriptGeneration,
                step_progress: 0.0,
                total_progress: 0.0,
                completed_steps: HashMap::new(),
            }),
        }
    }

    pub fn with_reporter(reporter: Box<dyn ProgressReporter>) -> Self {
        let mut tracker = Self::new();
        tracker.reporter = Some(reporter);
        tracker
    }

    pub fn set_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        self.reporter = Some(reporter);
    }

    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> Option<usize> {
        self.reporter.as_mut().map(|reporter| reporter.add_observer(observer))
    }

    pub fn current_step(&self) -> ProcessStep {
        self.state.read().current_step
    }

    pub fn total_progress(&self) -> f32 {
        self.state.read().total_progress
    }

    /// Перейти к этапу; предыдущий считается завершенным
    pub fn set_step(&self, step: ProcessStep) {
        {
            let mut state = self.state.write();
            if state.current_step == step {
                return;
            }
            let previous = state.current_step;
            state.completed_steps.insert(previous, 100.0);
            state.current_step = step;
            state.step_progress = 0.0;
            state.recompute_total();
        }
        self.report_progress(None);
    }

    /// Обновить прогресс текущего этапа
    pub fn update_step_progress(&self, progress: f32, details: Option<String>) {
        {
            let mut state = self.state.write();
            state.step_progress = progress.clamp(0.0, 100.0);
            state.recompute_total();
        }
        self.report_progress(details);
    }

    /// Отметить завершение всего процесса
    pub fn complete(&self) {
        {
            let mut state = self.state.write();
            let current = state.current_step;
            state.completed_steps.insert(current, 100.0);
            state.step_progress = 100.0;
            state.total_progress = 100.0;
        }
        self.report_progress(Some("Процесс завершен".to_string()));
    }

    fn report_progress(&self, details: Option<String>) {
        if let Some(reporter) = &self.reporter {
            let info = {
                let state = self.state.read();
                ProgressInfo::new(
                    state.current_step.as_str(),
                    state.step_progress,
                    state.total_progress,
                    details,
                )
            };
            reporter.notify_progress(info);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
