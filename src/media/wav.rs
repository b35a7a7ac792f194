//! # WAV
//!
//! Кодирование моно PCM семплов в несжатый WAV (16 бит) и обратное
//! декодирование. Заголовок всегда канонический, 44 байта:
//!
//! | смещение | поле                                   |
//! |----------|----------------------------------------|
//! | 0        | `RIFF`, размер `36 + dataSize`         |
//! | 8        | `WAVE`                                 |
//! | 12       | `fmt `, 16, формат 1 (PCM), каналы     |
//! | 24       | частота, byte rate, block align, 16    |
//! | 36       | `data`, `dataSize`                     |
//! | 44       | семплы int16 little endian             |

use std::io::Cursor;
use std::path::Path;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;

use crate::error::{ClipSyncError, Result};

/// Размер заголовка WAV для PCM без расширений
pub const WAV_HEADER_LEN: usize = 44;

fn mono_pcm16_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Переводит семпл с плавающей точкой в int16.
///
/// Значение ограничивается диапазоном [-1, 1], отрицательные умножаются на
/// 0x8000, неотрицательные на 0x7FFF, дробная часть отбрасывается.
pub fn float_to_pcm16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Обратное преобразование к [`float_to_pcm16`]
pub fn pcm16_to_float(sample: i16) -> f32 {
    if sample < 0 {
        sample as f32 / 32768.0
    } else {
        sample as f32 / 32767.0
    }
}

/// Кодирует моно семплы в WAV (PCM 16 бит) в памяти.
///
/// Чистая функция: одинаковый вход всегда дает побайтово одинаковый выход.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, mono_pcm16_spec(sample_rate))?;
        for &sample in samples {
            writer.write_sample(float_to_pcm16(sample))?;
        }
        writer.finalize()?;
    }

    let bytes = cursor.into_inner();
    debug!("Encoded {} samples at {} Hz into {} WAV bytes", samples.len(), sample_rate, bytes.len());
    Ok(bytes)
}

/// Записывает WAV файл на диск
pub fn write_wav_file<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    let bytes = encode_wav(samples, sample_rate)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Декодирует WAV (PCM 16 бит) в моно семплы.
///
/// Многоканальный звук сводится в моно усреднением.
pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(ClipSyncError::InvalidFormat(format!(
            "Unsupported WAV format: {:?}, {} bits",
            spec.sample_format, spec.bits_per_sample
        )));
    }

    let samples = reader
        .into_samples::<i16>()
        .map(|s| s.map(pcm16_to_float))
        .collect::<std::result::Result<Vec<f32>, hound::Error>>()?;

    let channels = spec.channels as usize;
    if channels > 1 {
        let mono = samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();
        Ok((mono, spec.sample_rate))
    } else {
        Ok((samples, spec.sample_rate))
    }
}
