//! Экспорт субтитров в формате WebVTT
//!
//! Сценарий выгружается как последовательность реплик без пауз,
//! по одной на бит.

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::debug;

use crate::error::Result;
use crate::script::Script;

/// Реплика субтитров
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCue {
    pub start_time: Duration,
    pub end_time: Duration,
    pub text: String,
}

impl SubtitleCue {
    pub fn new(start_time: Duration, end_time: Duration, text: String) -> Self {
        Self {
            start_time,
            end_time,
            text,
        }
    }
}

/// Реплики сценария в порядке битов
pub fn cues_from_script(script: &Script) -> Vec<SubtitleCue> {
    script
        .intervals()
        .into_iter()
        .zip(script.beats())
        .map(|(interval, beat)| {
            SubtitleCue::new(
                secs_to_duration(interval.start),
                secs_to_duration(interval.end),
                beat.content.clone(),
            )
        })
        .collect()
}

/// Сценарий как документ WebVTT
pub fn to_webvtt(script: &Script) -> String {
    let mut out = String::from("WEBVTT\n");
    for (index, cue) in cues_from_script(script).iter().enumerate() {
        out.push_str(&format!(
            "\n{}\n{} --> {}\n{}\n",
            index + 1,
            format_timestamp(cue.start_time),
            format_timestamp(cue.end_time),
            escape_cue_text(&cue.text)
        ));
    }
    out
}

/// Записать субтитры сценария в файл
pub fn write_webvtt<P: AsRef<Path>>(script: &Script, path: P) -> Result<()> {
    fs::write(path.as_ref(), to_webvtt(script))?;
    debug!("Wrote {} cues to {}", script.len(), path.as_ref().display());
    Ok(())
}

/// Текст реплики одной строкой с экранированными `&`, `<` и `>`.
/// В результате нет ни пустых строк, ни `-->`.
fn escape_cue_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn format_timestamp(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

fn secs_to_duration(secs: f64) -> Duration {
    Duration::from_millis((secs.max(0.0) * 1000.0).round() as u64)
}
