//! load_profile - synthetic workload driver for the segmented graph store
//!
//! Runs one writer appending power-law distributed edges while N reader
//! threads traverse and sample concurrently, then prints the store's
//! counters and per-segment stats.
//!
//! Usage:
//!   load_profile [--edges N] [--readers N] [--config <graph.json>]
//!
//! Logging is controlled by RUST_LOG (e.g. `RUST_LOG=bigraph=debug`).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{bail, Context};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use bigraph::{CounterStats, GraphConfig, SegmentStore, StoreReader};

const DEFAULT_EDGES: u64 = 2_000_000;
const DEFAULT_READERS: usize = 4;
const SAMPLES_PER_QUERY: usize = 8;

fn print_usage() {
    println!("Usage: load_profile [--edges N] [--readers N] [--config <graph.json>]");
    println!();
    println!("Options:");
    println!("  --edges N      Edges to append (default: {DEFAULT_EDGES})");
    println!("  --readers N    Concurrent reader threads (default: {DEFAULT_READERS})");
    println!("  --config PATH  GraphConfig JSON file (default: built-in defaults)");
    println!();
    println!("Flags:");
    println!("  -V, --version  Print version information");
    println!("  -h, --help     Print this help message");
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

/// Left id with a power-law popularity: id k is drawn with probability
/// roughly proportional to `k^-alpha`.
fn power_law_left<R: Rng>(rng: &mut R, alpha: f64, num_left: u64) -> u64 {
    let u: f64 = rng.gen_range(f64::EPSILON..1.0);
    let x = u.powf(-1.0 / (alpha - 1.0));
    (x as u64).saturating_sub(1) % num_left
}

fn run_reader(reader: StoreReader, stop: &AtomicBool, num_left: u64, seed: u64) -> (u64, u64) {
    let mut ctx = reader.context();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut samples = Vec::with_capacity(SAMPLES_PER_QUERY);
    let mut queries = 0u64;
    let mut edges_seen = 0u64;
    while !stop.load(Ordering::Relaxed) {
        let left = rng.gen_range(0..num_left.min(1024));
        edges_seen += ctx.query_edges(left).count() as u64;
        samples.clear();
        ctx.sample_edges(left, SAMPLES_PER_QUERY, &mut rng, &mut samples);
        queries += 1;
    }
    ctx.release();
    (queries, edges_seen)
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("load_profile {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("load_profile {}", env!("CARGO_PKG_VERSION"));
        println!();
        print_usage();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let num_edges: u64 = match flag_value(&args, "--edges") {
        Some(v) => v.parse().with_context(|| format!("invalid --edges value '{v}'"))?,
        None => DEFAULT_EDGES,
    };
    let num_readers: usize = match flag_value(&args, "--readers") {
        Some(v) => v.parse().with_context(|| format!("invalid --readers value '{v}'"))?,
        None => DEFAULT_READERS,
    };
    let config = match flag_value(&args, "--config") {
        Some(path) => GraphConfig::read_from(&PathBuf::from(path))
            .with_context(|| format!("failed to load config from {path}"))?,
        None => GraphConfig::default(),
    };
    if num_edges == 0 {
        bail!("--edges must be positive");
    }

    let alpha = config.left_power_law_exponent;
    let num_left = u64::from(config.expected_num_left_nodes.max(1));
    let num_right = u64::from(config.expected_num_right_nodes.max(1));

    let stats = Arc::new(CounterStats::new());
    let mut store = SegmentStore::with_stats(config.clone(), stats.clone())?;
    let max_type = store.codec().max_edge_type();
    let reader = store.reader();
    let stop = AtomicBool::new(false);
    let total_queries = AtomicU64::new(0);
    let total_seen = AtomicU64::new(0);

    eprintln!(
        "[load_profile] {num_edges} edges, {num_readers} readers, {} segments x {} edges, tiers {:?}",
        config.max_num_segments,
        config.max_num_edges_per_segment,
        store.tier_schedule().capacities()
    );

    let started = Instant::now();
    let write_result = thread::scope(|scope| {
        for id in 0..num_readers {
            let reader = reader.clone();
            let (stop, total_queries, total_seen) = (&stop, &total_queries, &total_seen);
            scope.spawn(move || {
                let (queries, seen) = run_reader(reader, stop, num_left, id as u64);
                total_queries.fetch_add(queries, Ordering::Relaxed);
                total_seen.fetch_add(seen, Ordering::Relaxed);
            });
        }

        let mut rng = StdRng::seed_from_u64(0xB16_2A9);
        let result = (0..num_edges).try_for_each(|_| {
            let left = power_law_left(&mut rng, alpha, num_left);
            let right = rng.gen_range(0..num_right);
            let edge_type = if max_type == 0 { 0 } else { rng.gen_range(0..=max_type) };
            store.add_edge(left, right, edge_type)
        });
        stop.store(true, Ordering::Relaxed);
        result
    });
    write_result.context("writer failed")?;
    let elapsed = started.elapsed();
    store.wait_for_optimizer();

    let snapshot = stats.snapshot();
    let queries = total_queries.load(Ordering::Relaxed);
    println!("elapsed:            {:.3}s", elapsed.as_secs_f64());
    println!(
        "write throughput:   {:.0} edges/s",
        num_edges as f64 / elapsed.as_secs_f64()
    );
    println!(
        "read throughput:    {:.0} queries/s ({} edges traversed)",
        queries as f64 / elapsed.as_secs_f64(),
        total_seen.load(Ordering::Relaxed)
    );
    println!("{snapshot:#?}");
    println!();
    println!(
        "{:>8} {:>10} {:>10} {:>10} {:>12} {:>10}",
        "segment", "state", "nodes", "edges", "allocated", "slack"
    );
    for segment in store.segment_stats() {
        println!(
            "{:>8} {:>10} {:>10} {:>10} {:>12} {:>10}",
            segment.segment_id,
            format!("{:?}", segment.state),
            segment.node_count,
            segment.edge_count,
            segment.allocated_records,
            segment.slack_records
        );
    }
    Ok(())
}
