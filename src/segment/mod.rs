//! Bounded, left-indexed edge segments.
//!
//! A segment is one time slice of the graph: up to `capacity` edges, each
//! filed under a segment-local dense id of its left node. The shared part
//! ([`Segment`]) is what readers see; the mutable part ([`SegmentWriter`])
//! belongs to the single writer and is consumed when the segment is sealed,
//! so a sealed segment cannot be written to at all.
//!
//! Lifecycle (one-directional):
//!
//! ```text
//! Open --seal--> Sealed --optimize--> Optimized
//!                  |                      |
//!                  +-------evict----------+--> Evicted
//! ```

pub mod tier;

pub(crate) mod id_map;
pub(crate) mod pool;
pub(crate) mod slab;

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::metrics::StatsReceiver;
use crate::snapshot::SnapshotCell;

use id_map::{IdMap, IdMapWriter};
use pool::{AdjacencyView, CompactPool, NodeSpan, PoolWriter, TieredPool};

pub use tier::{TierSchedule, MAX_TIERS};

// ── Segment State ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SegmentState {
    /// Live: the writer's target.
    Open = 0,
    /// Full; content frozen, still in the tiered layout.
    Sealed = 1,
    /// Repacked into the compact layout.
    Optimized = 2,
    /// Dropped from the resident set; freed once unreferenced.
    Evicted = 3,
}

impl SegmentState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Open,
            1 => Self::Sealed,
            2 => Self::Optimized,
            _ => Self::Evicted,
        }
    }

    pub fn can_transition_to(self, next: SegmentState) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::Sealed)
                | (Self::Sealed, Self::Optimized)
                | (Self::Sealed, Self::Evicted)
                | (Self::Optimized, Self::Evicted)
        )
    }
}

// ── Segment ────────────────────────────────────────────────────────

/// Reader-visible half of a segment. Shared via `Arc` between the store,
/// snapshots, cursors and the optimizer.
pub struct Segment {
    id: u32,
    capacity: u32,
    state: AtomicU8,
    /// Published after the edge's record and node descriptor.
    edge_count: AtomicU32,
    node_count: AtomicU32,
    ids: IdMap,
    view: SnapshotCell<AdjacencyView>,
}

impl Segment {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn state(&self) -> SegmentState {
        SegmentState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn edge_count(&self) -> u32 {
        self.edge_count.load(Ordering::Acquire)
    }

    /// Distinct left nodes with edges in this segment.
    pub fn node_count(&self) -> u32 {
        self.node_count.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        self.edge_count() >= self.capacity
    }

    /// Segment-local id of `left`, if it has edges here.
    #[inline]
    pub fn internal_id(&self, left: u64) -> Option<u32> {
        self.ids.get(left)
    }

    /// Published degree of a dense id.
    pub fn degree_of(&self, internal: u32) -> u32 {
        self.view.load().span(internal).degree
    }

    /// Degree of an application left id in this segment (0 if absent).
    pub fn left_degree(&self, left: u64) -> u32 {
        self.internal_id(left).map_or(0, |internal| self.degree_of(internal))
    }

    /// Raw records of a dense id in insertion order. O(degree).
    pub fn edges_of(&self, internal: u32) -> SegmentEdges {
        let view = self.view.load();
        let span = view.span(internal);
        SegmentEdges {
            view,
            span,
            next: 0,
        }
    }

    pub(crate) fn view(&self) -> Arc<AdjacencyView> {
        self.view.load()
    }

    /// True once the optimizer's layout is installed.
    pub fn is_compact(&self) -> bool {
        self.view.load().is_compact()
    }

    /// Advance the lifecycle. Fails on any transition not in the diagram.
    pub(crate) fn transition(&self, to: SegmentState) -> Result<()> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let from = SegmentState::from_u8(current);
            if !from.can_transition_to(to) {
                return Err(GraphError::InvalidTransition {
                    segment: self.id,
                    from,
                    to,
                });
            }
            match self.state.compare_exchange(
                current,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Swap in the optimized layout. The tiered pool is released once the
    /// last reader holding it lets go.
    pub(crate) fn install_compact(&self, pool: CompactPool) {
        let _previous = self.view.store(Arc::new(AdjacencyView::Compact(pool)));
    }

    pub fn stats(&self) -> SegmentStats {
        let view = self.view.load();
        let edge_count = self.edge_count();
        let allocated_records = view.allocated_records();
        SegmentStats {
            segment_id: self.id,
            state: self.state(),
            node_count: self.node_count(),
            edge_count,
            allocated_records,
            slack_records: allocated_records.saturating_sub(edge_count as u64),
            compact: view.is_compact(),
            id_table_capacity: self.ids.capacity(),
            tier_shards: match &*view {
                AdjacencyView::Tiered(pool) => pool.allocated_shards(),
                AdjacencyView::Compact(_) => Vec::new(),
            },
        }
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("edge_count", &self.edge_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Iterator over one node's raw records in one segment.
pub struct SegmentEdges {
    view: Arc<AdjacencyView>,
    span: NodeSpan,
    next: u32,
}

impl Iterator for SegmentEdges {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let record = self.view.record(&self.span, self.next)?;
        self.next += 1;
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.span.degree - self.next.min(self.span.degree)) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SegmentEdges {}

/// Per-segment diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentStats {
    pub segment_id: u32,
    pub state: SegmentState,
    pub node_count: u32,
    pub edge_count: u32,
    /// Record slots held by the current layout.
    pub allocated_records: u64,
    /// Allocated but unused slots (tier slack). Zero once optimized.
    pub slack_records: u64,
    pub compact: bool,
    /// Slots in the dense id table (kept at most half full).
    pub id_table_capacity: usize,
    /// Storage shards allocated per tier (empty once optimized).
    pub tier_shards: Vec<usize>,
}

// ── Segment Writer ─────────────────────────────────────────────────

/// Writer-owned half of the live segment.
///
/// NOT shared -- single-writer access assumed. `seal` consumes it.
pub struct SegmentWriter {
    segment: Arc<Segment>,
    pool: PoolWriter,
    ids: IdMapWriter,
}

impl SegmentWriter {
    pub fn new(
        id: u32,
        config: &GraphConfig,
        schedule: Arc<TierSchedule>,
        stats: Arc<dyn StatsReceiver>,
    ) -> Self {
        let capacity = config.max_num_edges_per_segment;
        let expected_nodes = config.expected_num_left_nodes.min(capacity) as usize;
        let pool = Arc::new(TieredPool::new(schedule, capacity as usize));
        let segment = Arc::new(Segment {
            id,
            capacity,
            state: AtomicU8::new(SegmentState::Open as u8),
            edge_count: AtomicU32::new(0),
            node_count: AtomicU32::new(0),
            ids: IdMap::new(expected_nodes),
            view: SnapshotCell::new(AdjacencyView::Tiered(pool.clone())),
        });
        let ids = IdMapWriter::new(&segment.ids);
        Self {
            pool: PoolWriter::new(id, pool, stats),
            ids,
            segment,
        }
    }

    pub fn segment(&self) -> &Arc<Segment> {
        &self.segment
    }

    pub fn is_full(&self) -> bool {
        self.segment.is_full()
    }

    /// Append an encoded record for `left`. Returns the dense id used.
    ///
    /// The record goes in first, then the node descriptor, then the segment
    /// edge count; each publish is a release store.
    pub fn add_edge(&mut self, left: u64, record: u64) -> Result<u32> {
        let count = self.segment.edge_count.load(Ordering::Relaxed);
        if count >= self.segment.capacity {
            return Err(GraphError::CapacityExceeded {
                segment: self.segment.id,
                capacity: self.segment.capacity,
            });
        }
        let (internal, fresh) = self.ids.get_or_insert(&self.segment.ids, left);
        self.pool.append(internal, record)?;
        if fresh {
            self.segment
                .node_count
                .store(self.ids.len(), Ordering::Release);
        }
        self.segment.edge_count.store(count + 1, Ordering::Release);
        Ok(internal)
    }

    /// Stop accepting writes and hand back the shared segment.
    pub fn seal(self) -> Result<Arc<Segment>> {
        self.segment.transition(SegmentState::Sealed)?;
        Ok(self.segment)
    }
}

// ── Tests ──────────────────────────────────────────────────────────
