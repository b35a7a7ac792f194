//! Модуль сценария
//!
//! Сценарий: упорядоченная последовательность битов. Порядок вставки
//! задает порядок на таймлайне: бит начинается там, где закончился предыдущий.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{ClipSyncError, Result};
use crate::media::audio::AudioTrack;

/// Смысловая роль бита в ролике
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum BeatRole {
    Hook,
    Body,
    Payoff,
    Cta,
}

impl BeatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hook => "HOOK",
            Self::Body => "BODY",
            Self::Payoff => "PAYOFF",
            Self::Cta => "CTA",
        }
    }
}

/// Один бит сценария: короткая фраза и ее длительность в секундах
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptBeat {
    #[serde(rename = "type")]
    pub role: BeatRole,
    pub content: String,
    pub duration: f64,
}

impl ScriptBeat {
    pub fn new(role: BeatRole, content: impl Into<String>, duration: f64) -> Self {
        Self {
            role,
            content: content.into(),
            duration,
        }
    }

    fn has_valid_duration(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0
    }
}

/// Интервал бита на таймлайне, `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatInterval {
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

/// Упорядоченный сценарий
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Script {
    beats: Vec<ScriptBeat>,
}

impl Script {
    /// Создать сценарий, проверив длительности
    pub fn new(beats: Vec<ScriptBeat>) -> Result<Self> {
        let script = Self { beats };
        script.validate()?;
        Ok(script)
    }

    /// Создать сценарий из ответа генератора, выбросив биты с
    /// неположительной длительностью
    pub fn from_generated(beats: Vec<ScriptBeat>) -> Self {
        let total = beats.len();
        let beats: Vec<ScriptBeat> = beats
            .into_iter()
            .filter(|beat| {
                let keep = beat.has_valid_duration();
                if !keep {
                    warn!("Dropping generated beat '{}' with duration {}", beat.content, beat.duration);
                }
                keep
            })
            .collect();
        if beats.len() < total {
            warn!("Kept {} of {} generated beats", beats.len(), total);
        }
        Self { beats }
    }

    pub fn beats(&self) -> &[ScriptBeat] {
        &self.beats
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    /// Суммарная номинальная длительность
    pub fn total_duration(&self) -> f64 {
        self.beats.iter().map(|beat| beat.duration).sum()
    }

    /// Интервалы битов на таймлайне в порядке сценария
    pub fn intervals(&self) -> Vec<BeatInterval> {
        let mut start = 0.0;
        self.beats
            .iter()
            .enumerate()
            .map(|(index, beat)| {
                let interval = BeatInterval {
                    index,
                    start,
                    end: start + beat.duration,
                };
                start += beat.duration;
                interval
            })
            .collect()
    }

    /// Проверка инварианта: у каждого бита положительная длительность
    pub fn validate(&self) -> Result<()> {
        for (index, beat) in self.beats.iter().enumerate() {
            if !beat.has_valid_duration() {
                return Err(ClipSyncError::InvalidFormat(format!(
                    "Beat {} has non-positive duration {}",
                    index, beat.duration
                )));
            }
        }
        Ok(())
    }

    /// Пользователь может менять только текст бита
    pub fn edit_content(&mut self, index: usize, content: impl Into<String>) -> Result<()> {
        let len = self.beats.len();
        let beat = self.beats.get_mut(index).ok_or_else(|| {
            ClipSyncError::InvalidFormat(format!("Beat index {} out of range ({} beats)", index, len))
        })?;
        beat.content = content.into();
        Ok(())
    }

    /// Копия сценария, где длительность каждого озвученного бита равна
    /// длине его речи. Неозвученные биты сохраняют номинальную длительность.
    pub fn retimed_to_speech(&self, track: &AudioTrack) -> Self {
        let beats = self
            .beats
            .iter()
            .enumerate()
            .map(|(index, beat)| match track.segment_duration(index) {
                Some(actual) if actual > 0.0 => ScriptBeat {
                    duration: actual,
                    ..beat.clone()
                },
                _ => beat.clone(),
            })
            .collect();
        Self { beats }
    }
}

impl From<Script> for Vec<ScriptBeat> {
    fn from(script: Script) -> Self {
        script.beats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::audio::AudioTrackBuilder;

    fn scenario() -> Script {
        Script::new(vec![
            ScriptBeat::new(BeatRole::Hook, "Xin chào", 3.0),
            ScriptBeat::new(BeatRole::Cta, "Theo dõi ngay", 2.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_json_shape() {
        let json = r#"[{"type":"HOOK","content":"Xin chào","duration":3},{"type":"CTA","content":"Theo dõi ngay","duration":2.5}]"#;
        let script: Script = serde_json::from_str(json).unwrap();
        assert_eq!(script.len(), 2);
        assert_eq!(script.beats()[0].role, BeatRole::Hook);
        assert_eq!(script.total_duration(), 5.5);

        let back = serde_json::to_string(&script).unwrap();
        assert!(back.contains(r#""type":"CTA""#));
    }

    #[test]
    fn test_rejects_non_positive_duration() {
        let result = Script::new(vec![ScriptBeat::new(BeatRole::Body, "x", 0.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_generated_beats_are_filtered() {
        let script = Script::from_generated(vec![
            ScriptBeat::new(BeatRole::Hook, "a", 2.0),
            ScriptBeat::new(BeatRole::Body, "b", -1.0),
            ScriptBeat::new(BeatRole::Body, "c", f64::NAN),
            ScriptBeat::new(BeatRole::Cta, "d", 1.0),
        ]);
        let contents: Vec<&str> = script.beats().iter().map(|b| b.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "d"]);
    }

    #[test]
    fn test_intervals_are_contiguous() {
        let intervals = scenario().intervals();
        assert_eq!(intervals[0].start, 0.0);
        assert_eq!(intervals[0].end, 3.0);
        assert_eq!(intervals[1].start, 3.0);
        assert_eq!(intervals[1].end, 5.0);
    }

    #[test]
    fn test_edit_content_only_changes_text() {
        let mut script = scenario();
        script.edit_content(1, "Đăng ký kênh").unwrap();
        assert_eq!(script.beats()[1].content, "Đăng ký kênh");
        assert_eq!(script.beats()[1].duration, 2.0);
        assert_eq!(script.beats()[1].role, BeatRole::Cta);
        assert!(script.edit_content(5, "x").is_err());
    }

    #[test]
    fn test_retime_to_speech() {
        let mut builder = AudioTrackBuilder::new(24_000);
        builder.push_samples(0, vec![0.0; 36_000]);
        let track = builder.build().unwrap();

        let retimed = scenario().retimed_to_speech(&track);
        assert_eq!(retimed.beats()[0].duration, 1.5);
        assert_eq!(retimed.beats()[1].duration, 2.0);
    }
}
