//! Segment-local dense id table: application left id -> internal id.
//!
//! Open addressing with linear probing over two parallel atomic arrays.
//! The writer inserts into the current table in place: key first, then
//! `internal + 1` into the value word with a release store, so a reader
//! that acquire-loads a non-zero value also sees its key. A zero value
//! marks an empty slot; entries are never removed.
//!
//! When the load factor would pass 1/2 the writer builds a table twice the
//! size, copies every entry, and publishes it through a [`SnapshotCell`].
//! Readers holding the old table still see every entry inserted before
//! the swap.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::snapshot::SnapshotCell;

const MIN_CAPACITY: usize = 16;

struct IdTable {
    keys: Box<[AtomicU64]>,
    values: Box<[AtomicU32]>,
    mask: usize,
}

impl IdTable {
    fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY).next_power_of_two();
        Self {
            keys: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            values: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            mask: capacity - 1,
        }
    }

    fn capacity(&self) -> usize {
        self.mask + 1
    }

    #[inline]
    fn get(&self, key: u64) -> Option<u32> {
        let mut i = mix(key) as usize & self.mask;
        loop {
            let value = self.values[i].load(Ordering::Acquire);
            if value == 0 {
                return None;
            }
            if self.keys[i].load(Ordering::Relaxed) == key {
                return Some(value - 1);
            }
            i = (i + 1) & self.mask;
        }
    }

    /// Writer only. `key` must be absent and the table below half full.
    fn insert_new(&self, key: u64, internal: u32) {
        let mut i = mix(key) as usize & self.mask;
        while self.values[i].load(Ordering::Relaxed) != 0 {
            i = (i + 1) & self.mask;
        }
        self.keys[i].store(key, Ordering::Relaxed);
        self.values[i].store(internal + 1, Ordering::Release);
    }

    fn entries(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.values.iter().zip(self.keys.iter()).filter_map(|(value, key)| {
            let value = value.load(Ordering::Relaxed);
            (value != 0).then(|| (key.load(Ordering::Relaxed), value - 1))
        })
    }
}

/// splitmix64 finalizer; spreads sequential ids across the table.
#[inline]
fn mix(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

// ── Reader Side ────────────────────────────────────────────────────

/// Shared, read-mostly view of a segment's id table.
pub(crate) struct IdMap {
    table: SnapshotCell<IdTable>,
}

impl IdMap {
    pub(crate) fn new(expected_nodes: usize) -> Self {
        Self {
            table: SnapshotCell::new(IdTable::with_capacity(expected_nodes * 2)),
        }
    }

    /// Internal id of `left`, if it has an edge in this segment.
    #[inline]
    pub(crate) fn get(&self, left: u64) -> Option<u32> {
        self.table.load().get(left)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.table.load().capacity()
    }
}

// ── Writer Side ────────────────────────────────────────────────────

/// Writer-side cursor over an [`IdMap`]: assigns dense ids.
pub(crate) struct IdMapWriter {
    current: Arc<IdTable>,
    len: u32,
}

impl IdMapWriter {
    pub(crate) fn new(map: &IdMap) -> Self {
        Self {
            current: map.table.load(),
            len: 0,
        }
    }

    /// Number of ids assigned so far.
    pub(crate) fn len(&self) -> u32 {
        self.len
    }

    /// Look up `left`, assigning the next dense id on first occurrence.
    /// Returns the id and whether it was newly assigned.
    pub(crate) fn get_or_insert(&mut self, map: &IdMap, left: u64) -> (u32, bool) {
        if let Some(internal) = self.current.get(left) {
            return (internal, false);
        }
        if (self.len as usize + 1) * 2 > self.current.capacity() {
            self.grow(map);
        }
        let internal = self.len;
        self.current.insert_new(left, internal);
        self.len += 1;
        (internal, true)
    }

    fn grow(&mut self, map: &IdMap) {
        let next = IdTable::with_capacity(self.current.capacity() * 2);
        for (key, internal) in self.current.entries() {
            next.insert_new(key, internal);
        }
        let next = Arc::new(next);
        // Readers still on the old table keep it alive until they finish
        let _previous = map.table.store(next.clone());
        self.current = next;
    }
}

// ── Tests ──────────────────────────────────────────────────────────
