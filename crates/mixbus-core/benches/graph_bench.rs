//! Criterion benchmarks for the channel graph and effect chain
//!
//! Run with: cargo bench -p mixbus-core
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mixbus_core::{ChannelGraph, ChannelId, EffectChain, StereoBuffer};

const CHANNEL_COUNTS: &[usize] = &[8, 32, 128];

/// Channels in groups of four feeding a bus each; buses feed master.
fn bussed_graph(channels: usize) -> ChannelGraph {
    let mut graph = ChannelGraph::new();
    let mut bus = ChannelId::MASTER;
    for i in 0..channels {
        let id = graph.add_channel(format!("ch{i}"));
        if i % 4 == 0 {
            bus = id;
        } else {
            graph.remove_send(id, ChannelId::MASTER).ok();
            graph.add_send(id, bus, 0.8).ok();
        }
    }
    graph
}

fn bench_render_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("ChannelGraph");

    for &count in CHANNEL_COUNTS {
        let graph = bussed_graph(count);

        group.bench_with_input(BenchmarkId::new("render_order", count), &count, |b, _| {
            b.iter(|| black_box(graph.render_order()));
        });

        group.bench_with_input(BenchmarkId::new("compile", count), &count, |b, _| {
            b.iter(|| black_box(graph.compile(|id| Some(id.index()))));
        });

        group.bench_with_input(BenchmarkId::new("add_send_cycle_check", count), &count, |b, _| {
            let mut graph = graph.clone();
            let last = ChannelId(count as u32);
            b.iter(|| black_box(graph.add_send(ChannelId::MASTER, black_box(last), 1.0)));
        });
    }

    group.finish();
}

fn bench_empty_chain(c: &mut Criterion) {
    let mut chain = EffectChain::new();
    let mut buffer = StereoBuffer::new(512);
    c.bench_function("EffectChain/empty_512", |b| {
        b.iter(|| chain.process(black_box(&mut buffer)));
    });
}

criterion_group!(benches, bench_render_order, bench_empty_chain);
criterion_main!(benches);
