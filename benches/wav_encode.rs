use clip_sync::media::wav::{decode_wav, encode_wav};
use clip_sync::config::SPEECH_SAMPLE_RATE;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// 30 секунд синусоиды 440 Гц
fn narration() -> Vec<f32> {
    let len = SPEECH_SAMPLE_RATE as usize * 30;
    (0..len)
        .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / SPEECH_SAMPLE_RATE as f32).sin() * 0.8)
        .collect()
}

fn bench_wav(c: &mut Criterion) {
    let samples = narration();
    c.bench_function("encode_wav 30s", |b| {
        b.iter(|| encode_wav(black_box(&samples), SPEECH_SAMPLE_RATE).unwrap())
    });

    let wav = encode_wav(&samples, SPEECH_SAMPLE_RATE).unwrap();
    c.bench_function("decode_wav 30s", |b| b.iter(|| decode_wav(black_box(&wav)).unwrap()));
}

criterion_group!(benches, bench_wav);
criterion_main!(benches);
