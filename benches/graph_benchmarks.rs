use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dasp_signal::{self as signal, Signal};
use verzug::{BlockRuntime, NodeSpec, Verzug};

pub fn assemble_benchmark(c: &mut Criterion) {
    c.bench_function("assemble 8-branch mix", |b| {
        b.iter(|| {
            let mut graph = Verzug::new(BlockRuntime::new());
            let mut branches = Vec::new();
            for _ in 0..8 {
                let tone = graph.add(NodeSpec::test_tone(440.0)).unwrap();
                let queue = graph
                    .add(NodeSpec::delay_queue(Duration::from_millis(10)))
                    .unwrap();
                branches.push(graph.chain([tone, queue]).unwrap());
            }
            let mixed = graph.mix(branches).unwrap();
            black_box(graph.assemble(mixed).unwrap())
        })
    });
}

pub fn process_benchmark(c: &mut Criterion) {
    c.bench_function("BlockRuntime.step(16)", |b| {
        let mut runtime = BlockRuntime::new();
        let mut feed = runtime.register_device("mic", 1 << 20);
        let mut sig = signal::rate(48_000.0).const_hz(220.0).sine();
        for _ in 0..(1 << 20) {
            let _ = feed.push(sig.next() as f32);
        }

        let mut graph = Verzug::new(runtime);
        let mic = graph.add(NodeSpec::device_source("mic")).unwrap();
        let tone = graph.add(NodeSpec::test_tone(440.0)).unwrap();
        let queue = graph
            .add(NodeSpec::delay_queue(Duration::from_millis(20)))
            .unwrap();
        let delayed = graph.chain([tone, queue]).unwrap();
        // The mix's output stays exposed; the engine null-routes it, which
        // keeps the bench from accumulating samples anywhere.
        let mixed = graph.mix(vec![mic.into(), delayed.into()]).unwrap();
        let mut pipeline = graph.assemble(mixed).unwrap();
        pipeline.play().unwrap();

        b.iter(|| pipeline.runtime_mut().step(black_box(16)));
    });
}

criterion_group!(benches, assemble_benchmark, process_benchmark);
criterion_main!(benches);
