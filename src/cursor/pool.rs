use super::SegmentCursor;

/// Slot table of per-segment cursors, indexed by the segment's position
/// in the snapshot being read.
///
/// Positions are always below `max_num_segments`, so every resident
/// segment gets its own slot whatever its id.
pub struct CursorPool {
    slots: Vec<Option<SegmentCursor>>,
    allocations: usize,
}

impl CursorPool {
    pub fn new(max_num_segments: usize) -> Self {
        Self {
            slots: (0..max_num_segments.max(1)).map(|_| None).collect(),
            allocations: 0,
        }
    }

    /// Cursor for the segment at `position`, created on first use.
    ///
    /// The table grows if a snapshot ever holds more segments than the
    /// pool was sized for.
    pub(crate) fn checkout(&mut self, position: usize) -> &mut SegmentCursor {
        if position >= self.slots.len() {
            self.slots.resize_with(position + 1, || None);
        }
        let allocations = &mut self.allocations;
        self.slots[position].get_or_insert_with(|| {
            *allocations += 1;
            SegmentCursor::default()
        })
    }

    pub(crate) fn get(&self, position: usize) -> Option<&SegmentCursor> {
        self.slots.get(position)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, position: usize) -> Option<&mut SegmentCursor> {
        self.slots.get_mut(position)?.as_mut()
    }

    /// Cursors created over the pool's lifetime.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Release every pinned layout; the cursors themselves are kept.
    pub fn release(&mut self) {
        for cursor in self.slots.iter_mut().flatten() {
            cursor.release();
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
