//! Criterion benchmarks for offline mixing through the engine
//!
//! Run with: cargo bench -p mixbus-engine
#![allow(missing_docs)]

use std::path::Path;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mixbus_config::Project;
use mixbus_core::{ChannelId, EffectSettings};
use mixbus_engine::{Applied, Command, Engine, EngineConfig};

const BLOCK_SIZES: &[usize] = &[64, 256, 1024];

fn starter_engine(max_block: usize) -> Engine {
    let mut engine = Engine::new(EngineConfig {
        max_block,
        ..EngineConfig::default()
    });
    engine
        .load_project(&Project::starter("bench"), Path::new("."))
        .expect("starter project loads");
    engine.apply(Command::Play).expect("play");
    engine
}

fn bench_starter(c: &mut Criterion) {
    let mut group = c.benchmark_group("StarterProject");

    for &block_size in BLOCK_SIZES {
        group.bench_with_input(BenchmarkId::new("render", block_size), &block_size, |b, &n| {
            let mut engine = starter_engine(n);
            let mut left = vec![0.0; n];
            let mut right = vec![0.0; n];
            b.iter(|| {
                engine.render_into(&mut left, &mut right).expect("render");
                black_box(left[0]);
            });
        });
    }

    group.finish();
}

fn bench_bus_fan_in(c: &mut Criterion) {
    let mut group = c.benchmark_group("BusFanIn");

    for &channels in &[4usize, 16, 48] {
        group.bench_with_input(BenchmarkId::new("channels", channels), &channels, |b, &count| {
            let mut engine = Engine::new(EngineConfig::default());
            let Ok(Applied::Channel(bus)) = engine.apply(Command::AddChannel { name: "Bus".into() })
            else {
                panic!("bus");
            };
            for i in 0..count {
                let Ok(Applied::Channel(id)) =
                    engine.apply(Command::AddChannel { name: format!("ch{i}") })
                else {
                    panic!("channel");
                };
                engine
                    .apply(Command::RemoveSend {
                        from: id,
                        to: ChannelId::MASTER,
                    })
                    .expect("remove send");
                engine
                    .apply(Command::AddSend {
                        from: id,
                        to: bus,
                        gain: 0.5,
                    })
                    .expect("add send");
                engine
                    .apply(Command::InsertEffect {
                        channel: id,
                        index: None,
                        effect: EffectSettings::new("filter"),
                    })
                    .expect("insert");
            }
            engine.apply(Command::Play).expect("play");

            let mut left = vec![0.0; 256];
            let mut right = vec![0.0; 256];
            b.iter(|| {
                engine.render_into(&mut left, &mut right).expect("render");
                black_box(right[255]);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_starter, bench_bus_fan_in);
criterion_main!(benches);
