//! Сеанс экспорта
//!
//! Состояние `Idle -> Capturing -> Finalizing -> Idle` меняется только
//! через [`ExportSession::apply`].

use log::debug;

use crate::error::{ClipSyncError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportState {
    #[default]
    Idle,
    Capturing,
    Finalizing,
}

/// События сеанса экспорта
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExportEvent {
    Start,
    /// Текущее время воспроизведения источника, секунды
    Tick { time: f64 },
    SourceEnded,
    Finished,
    Abort,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSession {
    state: ExportState,
    progress: u8,
    total_duration: f64,
}

impl ExportSession {
    /// Длительность для процента берется из сценария, а при нулевой
    /// сумме из исходного видео.
    pub fn new(script_duration: f64, source_duration: f64) -> Self {
        let total_duration = if script_duration > 0.0 { script_duration } else { source_duration };
        Self {
            state: ExportState::Idle,
            progress: 0,
            total_duration,
        }
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    /// Процент выполнения, 0..=100
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn is_exporting(&self) -> bool {
        self.state != ExportState::Idle
    }

    /// Применить событие. Недопустимый переход возвращает `InvalidState`
    /// и не меняет сеанс.
    pub fn apply(&mut self, event: ExportEvent) -> Result<ExportState> {
        let next = match (self.state, event) {
            (_, ExportEvent::Abort) => {
                self.progress = 0;
                ExportState::Idle
            }
            (ExportState::Idle, ExportEvent::Start) => {
                self.progress = 0;
                ExportState::Capturing
            }
            (ExportState::Capturing, ExportEvent::Tick { time }) => {
                self.progress = percent(time, self.total_duration);
                ExportState::Capturing
            }
            (ExportState::Capturing, ExportEvent::SourceEnded) => ExportState::Finalizing,
            (ExportState::Finalizing, ExportEvent::Finished) => {
                self.progress = 0;
                ExportState::Idle
            }
            (state, event) => {
                return Err(ClipSyncError::InvalidState(format!(
                    "{:?} is not allowed in {:?}",
                    event, state
                )))
            }
        };
        if next != self.state {
            debug!("Export session {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        Ok(next)
    }
}

/// `floor(time / total * 100)` в пределах 0..=100
fn percent(time: f64, total: f64) -> u8 {
    if total.is_nan() || total <= 0.0 || !time.is_finite() {
        return 0;
    }
    (time / total * 100.0).floor().clamp(0.0, 100.0) as u8
}
