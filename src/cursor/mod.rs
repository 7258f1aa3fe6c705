//! Reusable read cursors.
//!
//! A query context owns one [`CursorPool`] per access pattern. Each pool
//! holds one [`SegmentCursor`] per resident segment, addressed by the
//! segment's position in the snapshot (oldest is 0). Positions stay below
//! `max_num_segments` and are unique within a snapshot, so slots never
//! collide, even after segment ids wrap. Repeated queries reset the
//! cursors in place instead of allocating new ones.
//!
//! - [`MultiSegmentCursor`]: sequential traversal, oldest segment first
//! - [`MultiSegmentSampler`]: uniform sampling over all segments

mod multi;
mod pool;
mod sampler;

use std::sync::Arc;

use crate::segment::pool::{AdjacencyView, NodeSpan};
use crate::segment::Segment;

pub use multi::MultiSegmentCursor;
pub use pool::CursorPool;
pub use sampler::MultiSegmentSampler;

// ── Segment Cursor ─────────────────────────────────────────────────

/// One node's records in one segment, pinned at reset time.
///
/// The cursor holds the segment's layout (not the segment), so an
/// optimize swap or eviction after the reset does not disturb it.
#[derive(Default)]
pub struct SegmentCursor {
    segment_id: u32,
    view: Option<Arc<AdjacencyView>>,
    span: NodeSpan,
    position: u32,
}

impl SegmentCursor {
    /// Point the cursor at `left` in `segment`. Returns the pinned degree.
    pub(crate) fn reset(&mut self, segment: &Segment, left: u64) -> u32 {
        self.segment_id = segment.id();
        self.position = 0;
        match segment.internal_id(left) {
            Some(internal) => {
                let view = segment.view();
                self.span = view.span(internal);
                self.view = Some(view);
            }
            None => {
                self.span = NodeSpan::default();
                self.view = None;
            }
        }
        self.span.degree
    }

    pub fn segment_id(&self) -> u32 {
        self.segment_id
    }

    pub fn degree(&self) -> u32 {
        self.span.degree
    }

    pub fn remaining(&self) -> u32 {
        self.span.degree.saturating_sub(self.position)
    }

    #[inline]
    pub(crate) fn next_record(&mut self) -> Option<u64> {
        let record = self.record_at(self.position)?;
        self.position += 1;
        Some(record)
    }

    /// Random access into the pinned span.
    #[inline]
    pub(crate) fn record_at(&self, index: u32) -> Option<u64> {
        self.view.as_ref()?.record(&self.span, index)
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Drop the pinned layout so its memory can be reclaimed.
    pub fn release(&mut self) {
        self.view = None;
        self.span = NodeSpan::default();
        self.position = 0;
    }
}

// ── Tests ──────────────────────────────────────────────────────────
