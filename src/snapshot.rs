//! Reader snapshots and their publication cell.
//!
//! Every structural change the writer makes (new live segment, seal,
//! eviction) produces a fresh immutable [`ReaderSnapshot`] that replaces
//! the previous one in a [`SnapshotCell`]. Readers clone the current
//! `Arc` once at the start of a query and never touch the cell again, so
//! they see one consistent segment list for the whole query.
//!
//! Reclamation is reference counted: an evicted segment is absent from
//! new snapshots but stays allocated until the last snapshot or cursor
//! holding it is dropped.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::segment::Segment;

// ── Snapshot Cell ──────────────────────────────────────────────────

/// Atomically replaceable `Arc<T>`.
///
/// Both sides are lock-free: `load` takes a counted reference through an
/// atomic pointer read and `store` is a single atomic swap. The previous
/// value is handed back to the caller, so its drop never runs inside the
/// cell.
pub struct SnapshotCell<T> {
    current: ArcSwap<T>,
}

impl<T> SnapshotCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: ArcSwap::from_pointee(value),
        }
    }

    #[inline]
    pub fn load(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// Publish `value`, returning the value it replaced.
    pub fn store(&self, value: Arc<T>) -> Arc<T> {
        self.current.swap(value)
    }
}

// ── Reader Snapshot ────────────────────────────────────────────────

/// Immutable view of the store at one publication.
pub struct ReaderSnapshot {
    version: u64,
    /// Resident segments, oldest first. The last one is live.
    segments: Vec<Arc<Segment>>,
    live_segment_id: u32,
    /// Edge count of each segment at publication time.
    edge_counts: Vec<u32>,
}

impl ReaderSnapshot {
    pub(crate) fn new(version: u64, segments: Vec<Arc<Segment>>, live_segment_id: u32) -> Self {
        let edge_counts = segments.iter().map(|s| s.edge_count()).collect();
        Self {
            version,
            segments,
            live_segment_id,
            edge_counts,
        }
    }

    /// Publication counter; strictly increases with every new snapshot.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn segments(&self) -> &[Arc<Segment>] {
        &self.segments
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn live_segment_id(&self) -> u32 {
        self.live_segment_id
    }

    /// Per-segment edge counts frozen at publication. The live segment
    /// keeps growing after that; read `Segment::edge_count` for its
    /// current value.
    pub fn edge_counts(&self) -> &[u32] {
        &self.edge_counts
    }

    /// Ids of the resident segments, oldest first.
    pub fn segment_ids(&self) -> Vec<u32> {
        self.segments.iter().map(|s| s.id()).collect()
    }

    /// Edges visible right now across all segments of this snapshot.
    pub fn total_edges(&self) -> u64 {
        self.segments.iter().map(|s| s.edge_count() as u64).sum()
    }
}

impl std::fmt::Debug for ReaderSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderSnapshot")
            .field("version", &self.version)
            .field("segments", &self.segment_ids())
            .field("live_segment_id", &self.live_segment_id)
            .field("edge_counts", &self.edge_counts)
            .finish()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
