//! Stats sink for the segmented graph store.
//!
//! The store never emits metrics on its own; it calls into a
//! [`StatsReceiver`] supplied at construction. Two implementations ship
//! with the crate:
//!
//! - [`NoopStats`]: discards everything (the default).
//! - [`CounterStats`]: lock-free atomic counters with a point-in-time
//!   [`StatsSnapshot`] for reporting.
//!
//! # Thread Safety
//!
//! Writer-side callbacks (`edge_added`, `segment_*`, `tier_*`) come from
//! the single writer thread, except `segment_optimized`, which fires on
//! the optimizer worker when background optimization is enabled. All
//! counters are `AtomicU64` with `Relaxed` ordering; they are statistics,
//! not synchronization.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bigraph::metrics::CounterStats;
//! use bigraph::{GraphConfig, SegmentStore};
//!
//! let stats = Arc::new(CounterStats::new());
//! let mut store = SegmentStore::with_stats(GraphConfig::default(), stats.clone()).unwrap();
//! store.add_edge(1, 2, 0).unwrap();
//! println!("edges added: {}", stats.snapshot().edges_added);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::segment::MAX_TIERS;

/// Callbacks the store invokes as it mutates state.
pub trait StatsReceiver: Send + Sync {
    /// An edge was appended to the live segment.
    fn edge_added(&self);

    /// An edge was refused by the codec (IdOutOfRange / EdgeTypeOverflow).
    fn edge_rejected(&self);

    /// A new live segment was allocated.
    fn segment_created(&self, segment_id: u32);

    /// A segment reached capacity and stopped accepting writes.
    fn segment_sealed(&self, segment_id: u32);

    /// A sealed segment was repacked into its compact layout.
    fn segment_optimized(&self, segment_id: u32, duration: Duration, edges: u64);

    /// A segment left the resident set.
    fn segment_evicted(&self, segment_id: u32);

    /// A tier buffer allocated another storage shard.
    fn tier_shard_allocated(&self, tier: usize);

    /// A node outgrew its slot and moved into `tier`.
    fn node_promoted(&self, tier: usize);
}

/// Discards all stats.
#[derive(Debug, Default)]
pub struct NoopStats;

impl StatsReceiver for NoopStats {
    fn edge_added(&self) {}
    fn edge_rejected(&self) {}
    fn segment_created(&self, _segment_id: u32) {}
    fn segment_sealed(&self, _segment_id: u32) {}
    fn segment_optimized(&self, _segment_id: u32, _duration: Duration, _edges: u64) {}
    fn segment_evicted(&self, _segment_id: u32) {}
    fn tier_shard_allocated(&self, _tier: usize) {}
    fn node_promoted(&self, _tier: usize) {}
}

/// Default sink: [`NoopStats`] behind an `Arc`.
pub fn default_stats() -> Arc<dyn StatsReceiver> {
    Arc::new(NoopStats)
}

/// Thread-safe counter-based stats sink.
///
/// Fixed memory regardless of graph size: a dozen scalar counters plus
/// two `MAX_TIERS`-wide arrays.
pub struct CounterStats {
    // ========================================================================
    // Edge Counters
    // ========================================================================
    edges_added: AtomicU64,
    edges_rejected: AtomicU64,

    // ========================================================================
    // Segment Lifecycle
    // ========================================================================
    segments_created: AtomicU64,
    segments_sealed: AtomicU64,
    segments_optimized: AtomicU64,
    segments_evicted: AtomicU64,

    // ========================================================================
    // Optimize Timing
    // ========================================================================
    /// Total time spent repacking segments (microseconds)
    optimize_total_us: AtomicU64,

    /// Last optimize duration (microseconds)
    last_optimize_us: AtomicU64,

    /// Edges repacked by the last optimize
    last_optimize_edges: AtomicU64,

    // ========================================================================
    // Tier Allocation
    // ========================================================================
    /// Storage shards allocated, per tier
    tier_shards: [AtomicU64; MAX_TIERS],

    /// Node promotions into each tier
    tier_promotions: [AtomicU64; MAX_TIERS],

    started_at: Instant,
}

impl CounterStats {
    pub fn new() -> Self {
        Self {
            edges_added: AtomicU64::new(0),
            edges_rejected: AtomicU64::new(0),
            segments_created: AtomicU64::new(0),
            segments_sealed: AtomicU64::new(0),
            segments_optimized: AtomicU64::new(0),
            segments_evicted: AtomicU64::new(0),
            optimize_total_us: AtomicU64::new(0),
            last_optimize_us: AtomicU64::new(0),
            last_optimize_edges: AtomicU64::new(0),
            tier_shards: std::array::from_fn(|_| AtomicU64::new(0)),
            tier_promotions: std::array::from_fn(|_| AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    /// Point-in-time copy of every counter.
    ///
    /// Counters are read independently, so a snapshot taken while the
    /// writer is active may be off by one between related fields.
    pub fn snapshot(&self) -> StatsSnapshot {
        let optimized = self.segments_optimized.load(Ordering::Relaxed);
        let optimize_total_us = self.optimize_total_us.load(Ordering::Relaxed);

        StatsSnapshot {
            edges_added: self.edges_added.load(Ordering::Relaxed),
            edges_rejected: self.edges_rejected.load(Ordering::Relaxed),
            segments_created: self.segments_created.load(Ordering::Relaxed),
            segments_sealed: self.segments_sealed.load(Ordering::Relaxed),
            segments_optimized: optimized,
            segments_evicted: self.segments_evicted.load(Ordering::Relaxed),
            optimize_avg_us: if optimized > 0 {
                optimize_total_us / optimized
            } else {
                0
            },
            last_optimize_us: self.last_optimize_us.load(Ordering::Relaxed),
            last_optimize_edges: self.last_optimize_edges.load(Ordering::Relaxed),
            tier_shards: trimmed(&self.tier_shards),
            tier_promotions: trimmed(&self.tier_promotions),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

impl Default for CounterStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsReceiver for CounterStats {
    fn edge_added(&self) {
        self.edges_added.fetch_add(1, Ordering::Relaxed);
    }

    fn edge_rejected(&self) {
        self.edges_rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn segment_created(&self, _segment_id: u32) {
        self.segments_created.fetch_add(1, Ordering::Relaxed);
    }

    fn segment_sealed(&self, _segment_id: u32) {
        self.segments_sealed.fetch_add(1, Ordering::Relaxed);
    }

    fn segment_optimized(&self, _segment_id: u32, duration: Duration, edges: u64) {
        let us = duration.as_micros() as u64;
        self.segments_optimized.fetch_add(1, Ordering::Relaxed);
        self.optimize_total_us.fetch_add(us, Ordering::Relaxed);
        self.last_optimize_us.store(us, Ordering::Relaxed);
        self.last_optimize_edges.store(edges, Ordering::Relaxed);
    }

    fn segment_evicted(&self, _segment_id: u32) {
        self.segments_evicted.fetch_add(1, Ordering::Relaxed);
    }

    fn tier_shard_allocated(&self, tier: usize) {
        if let Some(counter) = self.tier_shards.get(tier) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn node_promoted(&self, tier: usize) {
        if let Some(counter) = self.tier_promotions.get(tier) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Copies the counters, dropping trailing zero tiers.
fn trimmed(counters: &[AtomicU64; MAX_TIERS]) -> Vec<u64> {
    let mut values: Vec<u64> = counters.iter().map(|c| c.load(Ordering::Relaxed)).collect();
    while values.last() == Some(&0) {
        values.pop();
    }
    values
}

/// Point-in-time view of [`CounterStats`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub edges_added: u64,
    pub edges_rejected: u64,
    pub segments_created: u64,
    pub segments_sealed: u64,
    pub segments_optimized: u64,
    pub segments_evicted: u64,
    pub optimize_avg_us: u64,
    pub last_optimize_us: u64,
    pub last_optimize_edges: u64,
    /// Shards allocated per tier, index = tier.
    pub tier_shards: Vec<u64>,
    /// Promotions into each tier, index = tier.
    pub tier_promotions: Vec<u64>,
    pub uptime_secs: u64,
}

// ── Tests ──────────────────────────────────────────────────────────
