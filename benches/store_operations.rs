//! Benchmark suite for SegmentStore operations
//!
//! Covers the hot paths:
//! - Write: add_edge with rollover, eviction and inline optimize
//! - Read: query_edges, sample_edge, degree through a reused QueryContext
//! - Maintenance: optimize_segment on a sealed segment
//!
//! Run: cargo bench --bench store_operations

use std::sync::Arc;

use bigraph::metrics::default_stats;
use bigraph::optimizer::optimize_segment;
use bigraph::segment::SegmentWriter;
use bigraph::{GraphConfig, SegmentStore, TierSchedule};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const NUM_LEFT: u64 = 10_000;

/// Power-law left ids: a handful of hubs, a long tail of light nodes.
fn make_edges(count: usize, seed: u64) -> Vec<(u64, u64, u8)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let u: f64 = rng.gen_range(f64::EPSILON..1.0);
            let left = (u.powf(-1.0) as u64).saturating_sub(1) % NUM_LEFT;
            (left, rng.gen_range(0..1_000_000), rng.gen_range(0..4))
        })
        .collect()
}

fn make_config(max_edges: u32) -> GraphConfig {
    GraphConfig::new(8, max_edges)
        .expected_num_left_nodes(NUM_LEFT as u32)
        .optimize_in_background(false)
}

fn create_store(edge_count: usize) -> SegmentStore {
    let mut store = SegmentStore::new(make_config(1 << 14)).unwrap();
    for (left, right, ty) in make_edges(edge_count, 7) {
        store.add_edge(left, right, ty).unwrap();
    }
    store
}

// ---------------------------------------------------------------------------
// Write path
// ---------------------------------------------------------------------------

fn bench_add_edge(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_edge");

    for size in [1_000, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || (SegmentStore::new(make_config(1 << 14)).unwrap(), make_edges(size, 1)),
                |(mut store, edges)| {
                    for (left, right, ty) in edges {
                        store.add_edge(black_box(left), right, ty).unwrap();
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Read path
// ---------------------------------------------------------------------------

fn bench_query_edges(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_edges");

    for size in [10_000, 100_000] {
        let store = create_store(size);
        let mut ctx = store.context();
        group.bench_with_input(BenchmarkId::new("hub", size), &size, |b, _| {
            b.iter(|| ctx.query_edges(black_box(0)).count());
        });
        group.bench_with_input(BenchmarkId::new("tail", size), &size, |b, _| {
            b.iter(|| ctx.query_edges(black_box(NUM_LEFT - 1)).count());
        });
    }

    group.finish();
}

fn bench_sample_edge(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_edge");

    for size in [10_000, 100_000] {
        let store = create_store(size);
        let mut ctx = store.context();
        let mut rng = StdRng::seed_from_u64(3);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| ctx.sample_edge(black_box(0), &mut rng));
        });

        let mut out = Vec::with_capacity(64);
        group.bench_with_input(BenchmarkId::new("batch_64", size), &size, |b, _| {
            b.iter(|| {
                out.clear();
                ctx.sample_edges(black_box(0), 64, &mut rng, &mut out)
            });
        });
    }

    group.finish();
}

fn bench_degree(c: &mut Criterion) {
    let store = create_store(100_000);
    let reader = store.reader();
    c.bench_function("degree", |b| b.iter(|| reader.degree(black_box(1))));
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize_segment");

    for size in [1_000u32, 16_384] {
        let config = make_config(size);
        let schedule = Arc::new(TierSchedule::from_config(&config));
        let edges = make_edges(size as usize, 5);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let mut writer =
                        SegmentWriter::new(0, &config, schedule.clone(), default_stats());
                    for &(left, right, _) in edges.iter().take(size as usize) {
                        writer.add_edge(left, right).unwrap();
                    }
                    writer.seal().unwrap()
                },
                |segment| optimize_segment(&segment).unwrap(),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_add_edge,
    bench_query_edges,
    bench_sample_edge,
    bench_degree,
    bench_optimize,
);
criterion_main!(benches);
