use std::sync::Arc;

use super::CursorPool;
use crate::codec::{Edge, EdgeCodec};
use crate::snapshot::ReaderSnapshot;

/// All of one left node's edges across the segments of one snapshot.
///
/// Segments are drained oldest first; within a segment edges come in
/// insertion order. The degree of every segment is pinned at reset, so
/// the sequence is finite even while the writer keeps appending.
pub struct MultiSegmentCursor {
    codec: EdgeCodec,
    pool: CursorPool,
    /// Snapshot positions of the segments holding the node, oldest first.
    active: Vec<usize>,
    /// Segment id per entry of `active`.
    ids: Vec<u32>,
    /// Pinned degree per entry of `active`.
    degrees: Vec<u32>,
    current: usize,
    /// Keeps the snapshot's segments resident while the cursor reads them.
    snapshot: Option<Arc<ReaderSnapshot>>,
}

impl MultiSegmentCursor {
    pub fn new(codec: EdgeCodec, max_num_segments: usize) -> Self {
        Self {
            codec,
            pool: CursorPool::new(max_num_segments),
            active: Vec::with_capacity(max_num_segments),
            ids: Vec::with_capacity(max_num_segments),
            degrees: Vec::with_capacity(max_num_segments),
            current: 0,
            snapshot: None,
        }
    }

    /// Re-target the cursor at `left` within `snapshot`.
    pub(crate) fn reset(&mut self, snapshot: Arc<ReaderSnapshot>, left: u64) {
        self.active.clear();
        self.ids.clear();
        self.degrees.clear();
        self.current = 0;
        for (position, segment) in snapshot.segments().iter().enumerate() {
            let cursor = self.pool.checkout(position);
            let degree = cursor.reset(segment, left);
            if degree > 0 {
                self.active.push(position);
                self.ids.push(segment.id());
                self.degrees.push(degree);
            }
        }
        self.snapshot = Some(snapshot);
    }

    /// Total pinned degree across segments.
    pub fn degree(&self) -> u64 {
        self.degrees.iter().map(|&d| d as u64).sum()
    }

    /// Number of segments holding at least one of the node's edges.
    pub fn num_segments(&self) -> usize {
        self.active.len()
    }

    /// `(segment_id, degree)` per segment holding the node, oldest first.
    pub fn segment_degrees(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.ids.iter().copied().zip(self.degrees.iter().copied())
    }

    pub(crate) fn degrees(&self) -> &[u32] {
        &self.degrees
    }

    /// Start over from the oldest segment.
    pub fn restart(&mut self) {
        for &position in &self.active {
            if let Some(cursor) = self.pool.get_mut(position) {
                cursor.rewind();
            }
        }
        self.current = 0;
    }

    /// Direct access to the `index`-th edge of the `slot`-th active segment.
    pub(crate) fn edge_at(&self, slot: usize, index: u32) -> Option<Edge> {
        let position = *self.active.get(slot)?;
        let record = self.pool.get(position)?.record_at(index)?;
        Some(self.codec.decode(record))
    }

    /// Let go of the snapshot and every pinned layout.
    pub fn release(&mut self) {
        self.pool.release();
        self.active.clear();
        self.ids.clear();
        self.degrees.clear();
        self.current = 0;
        drop(self.snapshot.take());
    }

    /// Cursors allocated by this cursor's pool so far.
    pub fn cursor_allocations(&self) -> usize {
        self.pool.allocations()
    }
}

impl Iterator for MultiSegmentCursor {
    type Item = Edge;

    fn next(&mut self) -> Option<Edge> {
        while let Some(&position) = self.active.get(self.current) {
            if let Some(record) = self
                .pool
                .get_mut(position)
                .and_then(|cursor| cursor.next_record())
            {
                return Some(self.codec.decode(record));
            }
            self.current += 1;
        }
        None
    }
}

// ── Tests ──────────────────────────────────────────────────────────
