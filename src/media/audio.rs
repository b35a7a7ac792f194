//! Модуль для работы с аудио
//!
//! Декодирование речевых фрагментов (base64, PCM 16 бит, little endian, моно)
//! и сборка из них одной непрерывной дорожки озвучки.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, warn};

use crate::error::{ClipSyncError, Result};
use crate::media::wav;

/// Нормирующий делитель для int16 семплов речи
const PCM16_SCALE: f32 = 32768.0;

/// Переводит сырые байты PCM16 LE в семплы [-1, 1].
///
/// Лишний последний байт (нечетная длина) отбрасывается.
pub fn pcm16_le_to_f32(bytes: &[u8]) -> Vec<f32> {
    if bytes.len() % 2 != 0 {
        warn!("PCM payload has odd length {}, dropping trailing byte", bytes.len());
    }
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM16_SCALE)
        .collect()
}

/// Декодирует base64 строку с PCM16 в семплы
pub fn decode_pcm16_base64(payload: &str) -> Result<Vec<f32>> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| ClipSyncError::InvalidFormat(format!("Invalid base64 audio payload: {}", e)))?;
    Ok(pcm16_le_to_f32(&bytes))
}

/// Положение фрагмента одного бита внутри дорожки
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpan {
    /// Индекс бита в сценарии
    pub beat_index: usize,
    /// Первый семпл фрагмента
    pub start: usize,
    /// Количество семплов
    pub len: usize,
}

/// Непрерывная моно дорожка озвучки
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    samples: Vec<f32>,
    sample_rate: u32,
    segments: Vec<SegmentSpan>,
}

impl AudioTrack {
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Фрагменты в порядке сценария
    pub fn segments(&self) -> &[SegmentSpan] {
        &self.segments
    }

    /// Длительность дорожки в секундах
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Длительность речи конкретного бита, если он был озвучен
    pub fn segment_duration(&self, beat_index: usize) -> Option<f64> {
        self.segments
            .iter()
            .find(|span| span.beat_index == beat_index)
            .map(|span| span.len as f64 / self.sample_rate as f64)
    }

    /// Кодирует дорожку в WAV
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        wav::encode_wav(&self.samples, self.sample_rate)
    }
}

/// Сборщик дорожки из фрагментов речи.
///
/// Фрагменты могут приходить в любом порядке; при сборке они
/// раскладываются по индексу бита, без пауз и наложений.
#[derive(Debug)]
pub struct AudioTrackBuilder {
    sample_rate: u32,
    segments: Vec<(usize, Vec<f32>)>,
}

impl AudioTrackBuilder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            segments: Vec::new(),
        }
    }

    /// Добавить уже декодированный фрагмент. Пустые фрагменты пропускаются.
    pub fn push_samples(&mut self, beat_index: usize, samples: Vec<f32>) -> bool {
        if samples.is_empty() {
            debug!("Beat {} produced no audio, skipping", beat_index);
            return false;
        }
        self.segments.push((beat_index, samples));
        true
    }

    /// Добавить фрагмент в виде base64 PCM16.
    ///
    /// Возвращает `Ok(false)`, если фрагмент пустой и был пропущен.
    pub fn push_base64(&mut self, beat_index: usize, payload: &str) -> Result<bool> {
        if payload.trim().is_empty() {
            debug!("Beat {} returned an empty speech payload", beat_index);
            return Ok(false);
        }
        let samples = decode_pcm16_base64(payload)?;
        Ok(self.push_samples(beat_index, samples))
    }

    /// Тишина длиной `secs` на месте бита без речи
    pub fn push_silence(&mut self, beat_index: usize, secs: f64) -> bool {
        let len = (secs.max(0.0) * self.sample_rate as f64).round() as usize;
        if len == 0 {
            return false;
        }
        debug!("Padding beat {} with {:.2}s of silence", beat_index, secs);
        self.segments.push((beat_index, vec![0.0; len]));
        true
    }

    /// Количество непустых фрагментов
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Собрать дорожку. `None` означает, что ни один бит не озвучен.
    pub fn build(mut self) -> Option<AudioTrack> {
        if self.segments.is_empty() {
            return None;
        }

        self.segments.sort_by_key(|(beat_index, _)| *beat_index);

        let total_len: usize = self.segments.iter().map(|(_, s)| s.len()).sum();
        let mut samples = Vec::with_capacity(total_len);
        let mut spans = Vec::with_capacity(self.segments.len());

        for (beat_index, segment) in &self.segments {
            spans.push(SegmentSpan {
                beat_index: *beat_index,
                start: samples.len(),
                len: segment.len(),
            });
            samples.extend_from_slice(segment);
        }

        debug!(
            "Built audio track: {} segments, {} samples at {} Hz",
            spans.len(),
            samples.len(),
            self.sample_rate
        );

        Some(AudioTrack {
            samples,
            sample_rate: self.sample_rate,
            segments: spans,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm_base64(samples: &[i16]) -> String {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_pcm_normalization() {
        let samples = pcm16_le_to_f32(&[0x00, 0x80, 0xFF, 0x7F, 0x00, 0x40]);
        assert_eq!(samples, vec![-1.0, 32767.0 / 32768.0, 0.5]);
    }

    #[test]
    fn test_odd_length_drops_trailing_byte() {
        let samples = pcm16_le_to_f32(&[0x00, 0x40, 0x12]);
        assert_eq!(samples, vec![0.5]);
    }

    #[test]
    fn test_invalid_base64_is_reported() {
        let result = decode_pcm16_base64("not base64!!");
        assert!(matches!(result, Err(ClipSyncError::InvalidFormat(_))));
    }

    #[test]
    fn test_concatenation_matches_scenario_lengths() {
        let mut builder = AudioTrackBuilder::new(24_000);
        assert!(builder.push_base64(0, &pcm_base64(&vec![100; 72_000])).unwrap());
        assert!(builder.push_base64(1, &pcm_base64(&vec![-100; 48_000])).unwrap());

        let track = builder.build().unwrap();
        assert_eq!(track.len(), 120_000);
        assert_eq!(track.duration_secs(), 5.0);
        assert_eq!(track.segment_duration(0), Some(3.0));
        assert_eq!(track.segment_duration(1), Some(2.0));

        let wav = track.to_wav().unwrap();
        assert_eq!(wav.len(), 44 + 240_000);
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 240_000);
    }

    #[test]
    fn test_empty_beat_is_skipped_without_silence() {
        let mut builder = AudioTrackBuilder::new(24_000);
        builder.push_base64(0, &pcm_base64(&[1, 2, 3])).unwrap();
        assert!(!builder.push_base64(1, "").unwrap());
        builder.push_base64(2, &pcm_base64(&[4, 5])).unwrap();

        let track = builder.build().unwrap();
        assert_eq!(track.len(), 5);
        let indices: Vec<usize> = track.segments().iter().map(|s| s.beat_index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(track.samples()[3], 4.0 / 32768.0);
    }

    #[test]
    fn test_no_audio_signal() {
        let mut builder = AudioTrackBuilder::new(24_000);
        builder.push_base64(0, "").unwrap();
        builder.push_base64(1, "   ").unwrap();
        assert!(builder.build().is_none());
    }

    #[test]
    fn test_order_follows_script_not_arrival() {
        let mut builder = AudioTrackBuilder::new(24_000);
        builder.push_samples(2, vec![0.3]);
        builder.push_samples(0, vec![0.1]);
        builder.push_samples(1, vec![0.2, 0.2]);

        let track = builder.build().unwrap();
        assert_eq!(track.samples(), &[0.1, 0.2, 0.2, 0.3]);
        assert_eq!(track.segments()[1], SegmentSpan { beat_index: 1, start: 1, len: 2 });
    }

    #[test]
    fn test_silence_fills_beat_slot() {
        let mut builder = AudioTrackBuilder::new(10);
        builder.push_samples(0, vec![0.5; 10]);
        assert!(builder.push_silence(1, 0.5));
        assert!(!builder.push_silence(2, 0.0));
        builder.push_samples(3, vec![-0.5; 5]);

        let track = builder.build().unwrap();
        assert_eq!(track.segment_duration(1), Some(0.5));
        assert_eq!(track.segments()[2].start, 15);
        assert!(track.samples()[10..15].iter().all(|s| *s == 0.0));
    }
}
