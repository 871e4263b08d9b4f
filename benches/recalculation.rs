//! Benchmarks for tick recalculation
//!
//! Run with: cargo bench

use block_logic::{Catalog, EngineConfig, PlacedBlock, PlotSnapshot, PortRef, Simulation, Value};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::builtin().expect("builtin catalog loads"))
}

fn config() -> EngineConfig {
    EngineConfig {
        tick_rate_hz: 0,
        ..Default::default()
    }
}

/// `len` adders in series, each adding 1 to the previous sum.
fn adder_chain(len: usize) -> PlotSnapshot {
    let mut plot = PlotSnapshot::new()
        .with_block(PlacedBlock::new("seed", "constant").with_value("value", Value::Number(0.0)));
    let mut previous = "seed".to_string();
    for i in 0..len {
        let uuid = format!("add{}", i);
        plot = plot.with_block(
            PlacedBlock::new(uuid.as_str(), "add")
                .with_wire("value1", previous.as_str(), "result")
                .with_value("value2", Value::Number(1.0)),
        );
        previous = uuid;
    }
    plot
}

/// `width` independent NOT gates fed by one constant.
fn fan_out(width: usize) -> PlotSnapshot {
    let mut plot = PlotSnapshot::new()
        .with_block(PlacedBlock::new("src", "constant").with_value("value", Value::Bool(true)));
    for i in 0..width {
        plot = plot.with_block(
            PlacedBlock::new(format!("not{}", i), "not").with_wire("value", "src", "result"),
        );
    }
    plot
}

fn bench_step_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_adder_chain");

    for len in [10, 100, 1000].iter() {
        let mut sim = Simulation::from_snapshot(catalog(), config(), &adder_chain(*len))
            .expect("chain builds");
        group.throughput(Throughput::Elements(*len as u64));
        group.bench_with_input(BenchmarkId::new("step", len), len, |b, _| {
            b.iter(|| black_box(sim.step()));
        });
    }

    group.finish();
}

fn bench_pull_tail(c: &mut Criterion) {
    let mut group = c.benchmark_group("pull_chain_tail");

    for len in [10, 100, 500].iter() {
        let mut sim = Simulation::from_snapshot(catalog(), config(), &adder_chain(*len))
            .expect("chain builds");
        let tail = PortRef::new(format!("add{}", len - 1), "result");
        let mut seed = 0.0;
        group.bench_with_input(BenchmarkId::new("set_then_pull", len), len, |b, _| {
            b.iter(|| {
                seed += 1.0;
                sim.set_input(&PortRef::new("seed", "value"), Value::Number(seed))
                    .expect("seed accepts numbers");
                sim.tick();
                black_box(sim.get_output(&tail))
            });
        });
    }

    group.finish();
}

fn bench_step_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_fan_out");

    for width in [100, 1000].iter() {
        let mut sim = Simulation::from_snapshot(catalog(), config(), &fan_out(*width))
            .expect("fan out builds");
        group.throughput(Throughput::Elements(*width as u64));
        group.bench_with_input(BenchmarkId::new("step", width), width, |b, _| {
            b.iter(|| black_box(sim.step()));
        });
    }

    group.finish();
}

fn bench_build_from_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_from_snapshot");

    for len in [100, 1000].iter() {
        let plot = adder_chain(*len);
        let catalog = catalog();
        group.bench_with_input(BenchmarkId::new("adder_chain", len), len, |b, _| {
            b.iter(|| {
                Simulation::from_snapshot(catalog.clone(), config(), black_box(&plot))
                    .expect("chain builds")
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_step_chain,
    bench_pull_tail,
    bench_step_fan_out,
    bench_build_from_snapshot,
);
criterion_main!(benches);
