//! Criterion benchmarks for mixbus effects
//!
//! Run with: cargo bench -p mixbus-effects
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mixbus_core::{Effect, Instrument};
use mixbus_effects::{Amp, Delay, Distortion, Filter, Tone};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 256, 1024];

fn generate_test_signal(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5
        })
        .collect()
}

fn bench_effect<E: Effect>(c: &mut Criterion, name: &str, mut effect: E) {
    let mut group = c.benchmark_group(name);

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, _| {
                let mut left = input.clone();
                let mut right = input.clone();
                b.iter(|| {
                    effect.process_block_stereo(&mut left, &mut right);
                    black_box(left[0])
                })
            },
        );
    }

    group.finish();
}

fn bench_effects(c: &mut Criterion) {
    bench_effect(c, "Amp", Amp::new(SAMPLE_RATE));
    bench_effect(c, "Delay", Delay::new(SAMPLE_RATE));
    bench_effect(c, "Filter", Filter::new(SAMPLE_RATE));
    bench_effect(c, "Distortion", Distortion::new(SAMPLE_RATE));
}

fn bench_tone(c: &mut Criterion) {
    let mut tone = Tone::new(SAMPLE_RATE);
    for key in [60, 64, 67, 71] {
        tone.note_on(key, 0.8);
    }
    c.bench_function("Tone/4_voices_256", |b| {
        b.iter(|| {
            for _ in 0..256 {
                black_box(tone.render());
            }
        })
    });
}

criterion_group!(benches, bench_effects, bench_tone);
criterion_main!(benches);
