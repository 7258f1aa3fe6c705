//! SegmentStore: the writer-facing entry point.
//!
//! Owns the live segment's writer, the resident sealed segments and the
//! publication cell readers load snapshots from.
//!
//! Write path:
//! 1. Encode (right, type); rejected edges leave the store untouched
//! 2. If the live segment is full, roll over: seal it, open a new live
//!    segment, evict the oldest beyond `max_num_segments`, publish a new
//!    snapshot, then hand the sealed segment to the optimizer
//! 3. Append to the live segment
//!
//! Snapshots are republished only on rollover. Appends to the live
//! segment become visible through its release-published counts, so
//! readers holding the current snapshot see them without a republish.
//!
//! `add_edge` takes `&mut self`: one writer, enforced by the borrow
//! checker. Readers go through [`StoreReader`] handles or per-caller
//! [`QueryContext`]s from any thread.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::Rng;

use crate::codec::{Edge, EdgeCodec};
use crate::config::GraphConfig;
use crate::cursor::{MultiSegmentCursor, MultiSegmentSampler};
use crate::error::{GraphError, Result};
use crate::metrics::{default_stats, StatsReceiver};
use crate::optimizer::{optimize_segment, OptimizeReport, Optimizer};
use crate::segment::{Segment, SegmentState, SegmentStats, SegmentWriter, TierSchedule};
use crate::snapshot::{ReaderSnapshot, SnapshotCell};

// ── Segment Store ──────────────────────────────────────────────────

pub struct SegmentStore {
    config: GraphConfig,
    schedule: Arc<TierSchedule>,
    stats: Arc<dyn StatsReceiver>,
    live: SegmentWriter,
    /// Resident sealed segments, oldest first.
    sealed: VecDeque<Arc<Segment>>,
    next_segment_id: u32,
    version: u64,
    reader: StoreReader,
    optimizer: Optimizer,
}

impl SegmentStore {
    pub fn new(config: GraphConfig) -> Result<Self> {
        Self::with_stats(config, default_stats())
    }

    pub fn with_stats(config: GraphConfig, stats: Arc<dyn StatsReceiver>) -> Result<Self> {
        config.validate()?;
        let codec = EdgeCodec::new(config.edge_type_bits)?;
        let schedule = Arc::new(TierSchedule::from_config(&config));
        let optimizer = Optimizer::new(config.optimize_in_background, stats.clone())?;

        let live = SegmentWriter::new(0, &config, schedule.clone(), stats.clone());
        stats.segment_created(0);
        tracing::debug!(
            segment_id = 0,
            tiers = ?schedule.capacities(),
            "Segment created"
        );

        let snapshot = ReaderSnapshot::new(0, vec![live.segment().clone()], 0);
        let reader = StoreReader {
            published: Arc::new(SnapshotCell::new(snapshot)),
            codec,
            max_num_segments: config.max_num_segments,
        };

        Ok(Self {
            config,
            schedule,
            stats,
            live,
            sealed: VecDeque::new(),
            next_segment_id: 1,
            version: 0,
            reader,
            optimizer,
        })
    }

    // ── Write Path ─────────────────────────────────────────────────

    /// Append one edge.
    ///
    /// Fails with `IdOutOfRange` / `EdgeTypeOverflow` when the edge does
    /// not fit the codec; nothing is written in that case.
    pub fn add_edge(&mut self, left: u64, right: u64, edge_type: u8) -> Result<()> {
        let record = match self.reader.codec.encode(right, edge_type) {
            Ok(record) => record,
            Err(e) => {
                self.stats.edge_rejected();
                tracing::warn!(left, right, edge_type, error = %e, "Edge rejected");
                return Err(e);
            }
        };
        if self.live.is_full() {
            self.roll_over()?;
        }
        self.live.add_edge(left, record)?;
        self.stats.edge_added();
        Ok(())
    }

    /// Append edges in order, stopping at the first rejected one.
    ///
    /// Returns the number added. On rejection the error is
    /// `BatchRejected` carrying the count added before it.
    pub fn add_edges<I>(&mut self, edges: I) -> Result<usize>
    where
        I: IntoIterator<Item = (u64, u64, u8)>,
    {
        let mut added = 0;
        for (left, right, edge_type) in edges {
            if let Err(e) = self.add_edge(left, right, edge_type) {
                return Err(GraphError::BatchRejected {
                    added,
                    source: Box::new(e),
                });
            }
            added += 1;
        }
        Ok(added)
    }

    fn roll_over(&mut self) -> Result<()> {
        let id = self.next_segment_id;
        self.next_segment_id = id.wrapping_add(1);

        let fresh = SegmentWriter::new(id, &self.config, self.schedule.clone(), self.stats.clone());
        let sealed = std::mem::replace(&mut self.live, fresh).seal()?;
        self.stats.segment_sealed(sealed.id());
        tracing::debug!(
            segment_id = sealed.id(),
            edges = sealed.edge_count(),
            nodes = sealed.node_count(),
            "Segment sealed"
        );
        self.stats.segment_created(id);
        tracing::debug!(segment_id = id, "Segment created");

        self.sealed.push_back(sealed.clone());
        while self.sealed.len() >= self.config.max_num_segments {
            let Some(oldest) = self.sealed.pop_front() else {
                break;
            };
            oldest.transition(SegmentState::Evicted)?;
            self.stats.segment_evicted(oldest.id());
            tracing::info!(
                segment_id = oldest.id(),
                edges = oldest.edge_count(),
                "Segment evicted"
            );
        }

        self.publish();

        if sealed.state() == SegmentState::Sealed {
            self.optimizer.submit(sealed);
        }
        Ok(())
    }

    /// Replace the published snapshot with the current segment list.
    fn publish(&mut self) {
        self.version += 1;
        let segments: Vec<Arc<Segment>> = self
            .sealed
            .iter()
            .cloned()
            .chain(std::iter::once(self.live.segment().clone()))
            .collect();
        let snapshot = ReaderSnapshot::new(self.version, segments, self.live.segment().id());
        // Readers holding the old snapshot keep it alive
        let _previous = self.reader.published.store(Arc::new(snapshot));
    }

    /// Repack a sealed segment now, on the calling thread.
    ///
    /// Rollover already submits every sealed segment to the optimizer, so
    /// this is for callers driving optimization themselves.
    pub fn optimize(&self, segment: &Segment) -> Result<OptimizeReport> {
        let report = optimize_segment(segment)?;
        self.stats
            .segment_optimized(report.segment_id, report.duration, report.edges);
        Ok(report)
    }

    /// Block until every queued background optimization has run.
    pub fn wait_for_optimizer(&self) {
        self.optimizer.wait_idle();
    }

    // ── Read Path ──────────────────────────────────────────────────

    /// Cloneable read handle for other threads.
    pub fn reader(&self) -> StoreReader {
        self.reader.clone()
    }

    /// Reusable per-caller query state.
    pub fn context(&self) -> QueryContext {
        self.reader.context()
    }

    pub fn current_snapshot(&self) -> Arc<ReaderSnapshot> {
        self.reader.current_snapshot()
    }

    pub fn query_edges(&self, left: u64) -> MultiSegmentCursor {
        self.reader.query_edges(left)
    }

    pub fn sample_edge<R: Rng + ?Sized>(&self, left: u64, rng: &mut R) -> Option<Edge> {
        self.reader.sample_edge(left, rng)
    }

    pub fn sample_edges<R: Rng + ?Sized>(&self, left: u64, k: usize, rng: &mut R) -> Vec<Edge> {
        self.reader.sample_edges(left, k, rng)
    }

    pub fn degree(&self, left: u64) -> u64 {
        self.reader.degree(left)
    }

    pub fn segment_stats(&self) -> Vec<SegmentStats> {
        self.reader.segment_stats()
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn codec(&self) -> EdgeCodec {
        self.reader.codec
    }

    pub fn tier_schedule(&self) -> &TierSchedule {
        &self.schedule
    }

    /// Resident segments including the live one.
    pub fn num_segments(&self) -> usize {
        self.sealed.len() + 1
    }

    pub fn live_segment_id(&self) -> u32 {
        self.live.segment().id()
    }
}

// ── Store Reader ───────────────────────────────────────────────────

/// Read-only handle to a store. Cheap to clone, `Send + Sync`.
///
/// Each call loads the current snapshot once. The convenience methods
/// allocate a fresh cursor per call; hot paths should hold a
/// [`QueryContext`] instead.
#[derive(Clone)]
pub struct StoreReader {
    published: Arc<SnapshotCell<ReaderSnapshot>>,
    codec: EdgeCodec,
    max_num_segments: usize,
}

impl StoreReader {
    pub fn current_snapshot(&self) -> Arc<ReaderSnapshot> {
        self.published.load()
    }

    pub fn context(&self) -> QueryContext {
        QueryContext {
            reader: self.clone(),
            cursor: MultiSegmentCursor::new(self.codec, self.max_num_segments),
            sampler: MultiSegmentSampler::new(self.codec, self.max_num_segments),
        }
    }

    /// Every edge of `left` in the current snapshot, oldest segment first.
    pub fn query_edges(&self, left: u64) -> MultiSegmentCursor {
        let mut cursor = MultiSegmentCursor::new(self.codec, self.max_num_segments);
        cursor.reset(self.current_snapshot(), left);
        cursor
    }

    pub fn sample_edge<R: Rng + ?Sized>(&self, left: u64, rng: &mut R) -> Option<Edge> {
        let mut sampler = MultiSegmentSampler::new(self.codec, self.max_num_segments);
        sampler.reset(self.current_snapshot(), left);
        sampler.sample(rng)
    }

    /// `k` uniform draws with replacement. Empty for an unknown node.
    pub fn sample_edges<R: Rng + ?Sized>(&self, left: u64, k: usize, rng: &mut R) -> Vec<Edge> {
        let mut sampler = MultiSegmentSampler::new(self.codec, self.max_num_segments);
        sampler.reset(self.current_snapshot(), left);
        let mut out = Vec::with_capacity(k);
        sampler.sample_into(k, rng, &mut out);
        out
    }

    /// Total degree of `left` across resident segments.
    pub fn degree(&self, left: u64) -> u64 {
        self.current_snapshot()
            .segments()
            .iter()
            .map(|s| s.left_degree(left) as u64)
            .sum()
    }

    pub fn segment_stats(&self) -> Vec<SegmentStats> {
        self.current_snapshot()
            .segments()
            .iter()
            .map(|s| s.stats())
            .collect()
    }

    pub fn codec(&self) -> EdgeCodec {
        self.codec
    }
}

// ── Query Context ──────────────────────────────────────────────────

/// One caller's reusable cursors. Not shared between threads; create one
/// per reader thread from [`StoreReader::context`].
///
/// After warm-up, queries and samples through a context allocate nothing.
pub struct QueryContext {
    reader: StoreReader,
    cursor: MultiSegmentCursor,
    sampler: MultiSegmentSampler,
}

impl QueryContext {
    /// Reset the context's cursor onto `left` and return it for iteration.
    pub fn query_edges(&mut self, left: u64) -> &mut MultiSegmentCursor {
        self.cursor.reset(self.reader.current_snapshot(), left);
        &mut self.cursor
    }

    pub fn sample_edge<R: Rng + ?Sized>(&mut self, left: u64, rng: &mut R) -> Option<Edge> {
        self.sampler.reset(self.reader.current_snapshot(), left);
        self.sampler.sample(rng)
    }

    /// `k` draws with replacement appended to `out`. Returns the count
    /// appended (0 for an unknown node).
    pub fn sample_edges<R: Rng + ?Sized>(
        &mut self,
        left: u64,
        k: usize,
        rng: &mut R,
        out: &mut Vec<Edge>,
    ) -> usize {
        self.sampler.reset(self.reader.current_snapshot(), left);
        self.sampler.sample_into(k, rng, out)
    }

    pub fn degree(&self, left: u64) -> u64 {
        self.reader.degree(left)
    }

    /// Drop pinned snapshots so evicted segments can be reclaimed while
    /// the context sits idle.
    pub fn release(&mut self) {
        self.cursor.release();
        self.sampler.release();
    }

    /// Per-segment cursors allocated by this context so far.
    pub fn cursor_allocations(&self) -> usize {
        self.cursor.cursor_allocations() + self.sampler.cursor_allocations()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
