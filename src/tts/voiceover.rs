//! Озвучка сценария
//!
//! Каждый бит синтезируется отдельным запросом. Запросы идут параллельно
//! в пределах семафора, но дорожка всегда собирается в порядке сценария.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::ai::GenerativeService;
use crate::config::{ClipSyncConfig, TimelineSync, TtsVoice};
use crate::error::{ClipSyncError, Result};
use crate::media::audio::{AudioTrack, AudioTrackBuilder};
use crate::progress::ProgressTracker;
use crate::script::Script;
use crate::tts::cache::SpeechCache;

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// Готовая озвучка
#[derive(Debug, Clone)]
pub struct Voiceover {
    pub track: AudioTrack,
    /// Дорожка в WAV для экспорта и скачивания
    pub wav: Vec<u8>,
    /// Индексы битов без речи
    pub skipped: Vec<usize>,
}

/// Подготовка текста бита для синтеза
pub fn prepare_text_for_tts(text: &str) -> String {
    let text = HTML_TAG.replace_all(text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Синтезировать речь для всех битов и собрать одну дорожку.
///
/// `Ok(None)` означает, что ни один бит не дал аудио. Ошибка сервиса на
/// отдельном бите пропускает этот бит; отсутствие ключа и отмена
/// прерывают всю озвучку.
pub async fn synthesize_voiceover<S>(
    service: &S,
    script: &Script,
    voice: TtsVoice,
    config: &ClipSyncConfig,
    cache: Option<&SpeechCache>,
    tracker: Option<&ProgressTracker>,
    cancel: &CancellationToken,
) -> Result<Option<Voiceover>>
where
    S: GenerativeService + ?Sized,
{
    let total = script.len();
    info!(
        "Synthesizing {} beats with voice {} (max {} concurrent)",
        total,
        voice.as_str(),
        config.max_concurrent_requests
    );

    let semaphore = Semaphore::new(config.max_concurrent_requests.max(1));
    let completed = AtomicUsize::new(0);

    let report = |done: usize| {
        if let Some(t) = tracker {
            let progress = if total == 0 { 100.0 } else { done as f32 / total as f32 * 100.0 };
            t.update_step_progress(progress, Some(format!("Озвучено {}/{} битов", done, total)));
        }
    };

    let tasks = script.beats().iter().enumerate().map(|(index, beat)| {
        let semaphore = &semaphore;
        let completed = &completed;
        let report = &report;
        async move {
            let _permit = semaphore.acquire().await.map_err(|_| ClipSyncError::Cancelled)?;
            if cancel.is_cancelled() {
                return Err(ClipSyncError::Cancelled);
            }

            let text = prepare_text_for_tts(&beat.content);
            if text.is_empty() {
                debug!("Beat {} has no text to synthesize", index);
                return Ok((index, None));
            }

            if let Some(payload) = cache.and_then(|c| c.get(&text, voice.as_str())) {
                debug!("Speech cache hit for beat {}", index);
                report(completed.fetch_add(1, Ordering::SeqCst) + 1);
                return Ok((index, Some(payload)));
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(ClipSyncError::Cancelled),
                result = service.generate_speech(&text, voice.as_str()) => result,
            };

            let payload = match result {
                Ok(payload) => payload,
                Err(e) if e.is_missing_credential() || e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!("Speech synthesis failed for beat {}: {}", index, e);
                    String::new()
                }
            };

            if let Some(c) = cache {
                if let Err(e) = c.insert(&text, voice.as_str(), &payload) {
                    warn!("Failed to cache speech for beat {}: {}", index, e);
                }
            }
            report(completed.fetch_add(1, Ordering::SeqCst) + 1);
            Ok((index, Some(payload)))
        }
    });

    let results = join_all(tasks).await;

    // В режиме FollowSpeech бит без речи занимает в дорожке свою номинальную длительность
    let pad_silence = config.timeline_sync == TimelineSync::FollowSpeech;
    let mut builder = AudioTrackBuilder::new(config.sample_rate);
    let mut skipped = Vec::new();
    for result in results {
        let (index, payload) = result?;
        let pushed = match payload {
            Some(payload) => builder.push_base64(index, &payload).unwrap_or_else(|e| {
                warn!("Discarding undecodable audio for beat {}: {}", index, e);
                false
            }),
            None => false,
        };
        if !pushed {
            skipped.push(index);
        }
    }

    if skipped.len() == total {
        warn!("No beat produced audio, narration is unavailable");
        return Ok(None);
    }
    if pad_silence {
        for &index in &skipped {
            builder.push_silence(index, script.beats()[index].duration);
        }
    }
    let Some(track) = builder.build() else {
        warn!("No beat produced audio, narration is unavailable");
        return Ok(None);
    };
    if !skipped.is_empty() {
        warn!("Beats without narration: {:?}", skipped);
    }

    let wav = track.to_wav()?;
    info!(
        "Voiceover ready: {:.2}s, {} bytes WAV",
        track.duration_secs(),
        wav.len()
    );
    Ok(Some(Voiceover { track, wav, skipped }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::{ScriptedService, SpeechReply};
    use crate::script::{BeatRole, ScriptBeat};
    use crate::subtitle::resolver::active_beat;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::time::Duration;

    fn pcm(len: usize, value: i16) -> String {
        let bytes: Vec<u8> = std::iter::repeat(value.to_le_bytes()).take(len).flatten().collect();
        STANDARD.encode(bytes)
    }

    fn script() -> Script {
        Script::new(vec![
            ScriptBeat::new(BeatRole::Hook, "Xin chào", 3.0),
            ScriptBeat::new(BeatRole::Body, "Không có âm thanh", 1.0),
            ScriptBeat::new(BeatRole::Cta, "Theo dõi ngay", 2.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_prepare_text() {
        assert_eq!(prepare_text_for_tts("<b>Xin</b>&nbsp;chào   bạn"), "Xin chào bạn");
        assert_eq!(prepare_text_for_tts("  "), "");
    }

    #[tokio::test]
    async fn test_track_follows_script_order_and_skips_silent_beats() {
        let service = ScriptedService::new()
            .with_speech("Xin chào", SpeechReply::Audio(pcm(72_000, 1000)))
            .with_speech("Không có âm thanh", SpeechReply::Audio(String::new()))
            .with_speech("Theo dõi ngay", SpeechReply::Audio(pcm(48_000, -1000)));
        let config = ClipSyncConfig {
            max_concurrent_requests: 3,
            ..ClipSyncConfig::default()
        };

        let voiceover = synthesize_voiceover(
            &service,
            &script(),
            TtsVoice::Kore,
            &config,
            None,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(voiceover.track.len(), 120_000);
        assert_eq!(voiceover.skipped, vec![1]);
        assert_eq!(voiceover.wav.len(), 44 + 240_000);
        assert!(voiceover.track.samples()[0] > 0.0);
        assert!(voiceover.track.samples()[119_999] < 0.0);
    }

    #[tokio::test]
    async fn test_upstream_error_skips_beat() {
        let service = ScriptedService::new()
            .with_speech("Xin chào", SpeechReply::Fail("quota exceeded".to_string()))
            .with_speech("Theo dõi ngay", SpeechReply::Audio(pcm(10, 5)));
        let voiceover = synthesize_voiceover(
            &service,
            &script(),
            TtsVoice::Puck,
            &ClipSyncConfig::default(),
            None,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(voiceover.track.len(), 10);
        assert_eq!(voiceover.skipped, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_missing_credential_aborts() {
        let service = ScriptedService::new().with_speech(
            "Xin chào",
            SpeechReply::Fail("Requested entity was not found.".to_string()),
        );
        let err = synthesize_voiceover(
            &service,
            &script(),
            TtsVoice::Kore,
            &ClipSyncConfig::default(),
            None,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.is_missing_credential());
    }

    #[tokio::test]
    async fn test_no_audio_at_all() {
        let service = ScriptedService::new();
        let result = synthesize_voiceover(
            &service,
            &script(),
            TtsVoice::Kore,
            &ClipSyncConfig::default(),
            None,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(result.is_none());
        assert_eq!(service.speech_calls(), 3);
    }

    #[tokio::test]
    async fn test_cache_avoids_repeat_requests() {
        let service = ScriptedService::new()
            .with_speech("Xin chào", SpeechReply::Audio(pcm(4, 1)))
            .with_speech("Theo dõi ngay", SpeechReply::Audio(pcm(4, 2)));
        let cache = SpeechCache::in_memory();
        let tracker = ProgressTracker::new();

        for _ in 0..2 {
            synthesize_voiceover(
                &service,
                &script(),
                TtsVoice::Kore,
                &ClipSyncConfig::default(),
                Some(&cache),
                Some(&tracker),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        }
        // Пустой ответ не кэшируется, поэтому средний бит запрашивается дважды
        assert_eq!(service.speech_calls(), 4);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let service = ScriptedService::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = synthesize_voiceover(
            &service,
            &script(),
            TtsVoice::Kore,
            &ClipSyncConfig::default(),
            None,
            None,
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(service.speech_calls(), 0);
    }

    #[tokio::test]
    async fn test_track_order_ignores_completion_order() {
        let service = ScriptedService::new()
            .with_speech("Xin chào", SpeechReply::Audio(pcm(3, 100)))
            .with_speech("Không có âm thanh", SpeechReply::Audio(pcm(2, 200)))
            .with_speech("Theo dõi ngay", SpeechReply::Audio(pcm(1, 300)))
            .with_delay("Xin chào", Duration::from_millis(60))
            .with_delay("Không có âm thanh", Duration::from_millis(30));
        let config = ClipSyncConfig {
            max_concurrent_requests: 3,
            ..ClipSyncConfig::default()
        };

        let voiceover = synthesize_voiceover(
            &service,
            &script(),
            TtsVoice::Kore,
            &config,
            None,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(service.completed(), vec!["Theo dõi ngay", "Không có âm thanh", "Xin chào"]);
        let indices: Vec<usize> = voiceover.track.segments().iter().map(|s| s.beat_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        let expected: Vec<f32> = [100, 100, 100, 200, 200, 300]
            .iter()
            .map(|v| *v as f32 / 32768.0)
            .collect();
        assert_eq!(voiceover.track.samples(), expected.as_slice());
    }

    #[tokio::test]
    async fn test_follow_speech_pads_silent_beats() {
        let service = ScriptedService::new()
            .with_speech("Xin chào", SpeechReply::Audio(pcm(24_000, 1000)))
            .with_speech("Theo dõi ngay", SpeechReply::Audio(pcm(12_000, 1000)));
        let config = ClipSyncConfig {
            timeline_sync: TimelineSync::FollowSpeech,
            ..ClipSyncConfig::default()
        };

        let voiceover = synthesize_voiceover(
            &service,
            &script(),
            TtsVoice::Kore,
            &config,
            None,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(voiceover.skipped, vec![1]);
        assert_eq!(voiceover.track.segment_duration(1), Some(1.0));
        assert_eq!(voiceover.track.duration_secs(), 2.5);

        // Речь последнего бита начинается там же, где его субтитр
        let retimed = script().retimed_to_speech(&voiceover.track);
        let last_audio_start = voiceover.track.segments()[2].start as f64 / 24_000.0;
        assert_eq!(last_audio_start, 2.0);
        assert_eq!(retimed.intervals()[2].start, 2.0);
        assert_eq!(active_beat(retimed.beats(), 2.1).map(|(i, _)| i), Some(2));
    }

    #[tokio::test]
    async fn test_nominal_mode_does_not_pad() {
        let service = ScriptedService::new()
            .with_speech("Xin chào", SpeechReply::Audio(pcm(24_000, 1000)))
            .with_speech("Theo dõi ngay", SpeechReply::Audio(pcm(12_000, 1000)));

        let voiceover = synthesize_voiceover(
            &service,
            &script(),
            TtsVoice::Kore,
            &ClipSyncConfig::default(),
            None,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(voiceover.track.segment_duration(1), None);
        assert_eq!(voiceover.track.duration_secs(), 1.5);
    }
}
