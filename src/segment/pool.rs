//! Power-law adjacency pool.
//!
//! Two physical layouts back a segment's adjacency lists:
//!
//! - [`TieredPool`]: the growable layout used while a segment is open. One
//!   [`AtomicSlab`] per tier holds fixed-size slots; a node owns one slot in
//!   one tier and moves up a tier (copying its records) when the slot fills.
//! - [`CompactPool`]: the exact-size layout the optimizer produces for a
//!   sealed segment. Offsets plus one contiguous record array, no slack.
//!
//! Publication order in the tiered pool is data-then-descriptor: records
//! are written with relaxed stores, then the node descriptor (location and
//! degree) is written with a release store. A reader that acquire-loads a
//! descriptor sees every record it covers. Abandoned slots are never
//! reused, so a reader still holding an old descriptor reads stale but
//! intact data.
//!
//! Descriptor layout (one `u64` per internal node id):
//!
//! ```text
//!  63    58 57                     32 31                            0
//! +--------+-------------------------+-------------------------------+
//! |  tier  |          slot           |            degree             |
//! +--------+-------------------------+-------------------------------+
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::metrics::StatsReceiver;
use crate::segment::slab::AtomicSlab;
use crate::segment::tier::TierSchedule;

const DEGREE_MASK: u64 = 0xFFFF_FFFF;
const SLOT_SHIFT: u32 = 32;
const SLOT_MASK: u64 = (1 << 26) - 1;
const TIER_SHIFT: u32 = 58;

// ── Node Span ──────────────────────────────────────────────────────

/// A node's records pinned at one point in time: where they start and how
/// many are visible. Cursors hold spans so a query sees one consistent
/// degree even while the writer keeps appending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct NodeSpan {
    pub(crate) tier: usize,
    pub(crate) base: usize,
    pub(crate) degree: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Descriptor {
    tier: usize,
    slot: u32,
    degree: u32,
}

impl Descriptor {
    fn pack(self) -> u64 {
        ((self.tier as u64) << TIER_SHIFT)
            | ((self.slot as u64 & SLOT_MASK) << SLOT_SHIFT)
            | self.degree as u64
    }

    fn unpack(word: u64) -> Self {
        Self {
            tier: (word >> TIER_SHIFT) as usize,
            slot: ((word >> SLOT_SHIFT) & SLOT_MASK) as u32,
            degree: (word & DEGREE_MASK) as u32,
        }
    }
}

// ── Tiered Pool ────────────────────────────────────────────────────

/// Growable tiered layout, shared between the writer and readers.
pub(crate) struct TieredPool {
    schedule: Arc<TierSchedule>,
    tiers: Vec<AtomicSlab>,
    descriptors: AtomicSlab,
    /// Record slots handed out across all tiers (used + slack).
    allocated_records: AtomicU64,
}

impl TieredPool {
    pub(crate) fn new(schedule: Arc<TierSchedule>, max_nodes: usize) -> Self {
        let tiers = (0..schedule.num_tiers())
            .map(|tier| AtomicSlab::new(schedule.max_records(tier)))
            .collect();
        Self {
            schedule,
            tiers,
            descriptors: AtomicSlab::new(max_nodes),
            allocated_records: AtomicU64::new(0),
        }
    }

    /// Pin a node's published records.
    #[inline]
    pub(crate) fn span(&self, node: u32) -> NodeSpan {
        let word = match self.descriptors.get(node as usize) {
            Some(word) => word.load(Ordering::Acquire),
            None => return NodeSpan::default(),
        };
        let desc = Descriptor::unpack(word);
        if desc.degree == 0 {
            return NodeSpan::default();
        }
        NodeSpan {
            tier: desc.tier,
            base: desc.slot as usize * self.schedule.capacity(desc.tier) as usize,
            degree: desc.degree,
        }
    }

    #[inline]
    pub(crate) fn record(&self, span: &NodeSpan, index: u32) -> Option<u64> {
        if index >= span.degree {
            return None;
        }
        let slab = self.tiers.get(span.tier)?;
        slab.get(span.base + index as usize)
            .map(|word| word.load(Ordering::Relaxed))
    }

    pub(crate) fn allocated_records(&self) -> u64 {
        self.allocated_records.load(Ordering::Relaxed)
    }

    /// Shards allocated per tier, for diagnostics.
    pub(crate) fn allocated_shards(&self) -> Vec<usize> {
        self.tiers.iter().map(AtomicSlab::allocated_shards).collect()
    }
}

// ── Pool Writer ────────────────────────────────────────────────────

/// Writer-side state for a [`TieredPool`]: slot allocation cursors.
///
/// NOT shared -- owned by the live segment's writer.
pub(crate) struct PoolWriter {
    segment_id: u32,
    pool: Arc<TieredPool>,
    next_slot: Vec<u32>,
    stats: Arc<dyn StatsReceiver>,
}

impl PoolWriter {
    pub(crate) fn new(segment_id: u32, pool: Arc<TieredPool>, stats: Arc<dyn StatsReceiver>) -> Self {
        let tiers = pool.schedule.num_tiers();
        Self {
            segment_id,
            pool,
            next_slot: vec![0; tiers],
            stats,
        }
    }

    /// Append `record` to `node`'s list and publish the new degree.
    ///
    /// Returns the node's degree after the append.
    pub(crate) fn append(&mut self, node: u32, record: u64) -> Result<u32> {
        let (desc_word, _) = self.descriptor_word(node)?;
        // Writer reads its own writes; no ordering needed
        let current = Descriptor::unpack(desc_word.load(Ordering::Relaxed));

        let next = if current.degree == 0 {
            let slot = self.alloc_slot(0)?;
            self.write(0, slot, 0, record)?;
            Descriptor { tier: 0, slot, degree: 1 }
        } else if current.degree < self.pool.schedule.capacity(current.tier) {
            self.write(current.tier, current.slot, current.degree, record)?;
            Descriptor {
                degree: current.degree + 1,
                ..current
            }
        } else {
            self.promote(current, record)?
        };

        let (desc_word, _) = self.descriptor_word(node)?;
        desc_word.store(next.pack(), Ordering::Release);
        Ok(next.degree)
    }

    /// Move a full node into a slot of the next tier, then append.
    fn promote(&mut self, current: Descriptor, record: u64) -> Result<Descriptor> {
        let tier = current.tier + 1;
        if tier >= self.pool.schedule.num_tiers() {
            return Err(self.overflow());
        }
        let slot = self.alloc_slot(tier)?;
        let old = NodeSpan {
            tier: current.tier,
            base: current.slot as usize * self.pool.schedule.capacity(current.tier) as usize,
            degree: current.degree,
        };
        for i in 0..current.degree {
            let value = self.pool.record(&old, i).ok_or_else(|| self.overflow())?;
            self.write(tier, slot, i, value)?;
        }
        self.write(tier, slot, current.degree, record)?;
        self.stats.node_promoted(tier);
        Ok(Descriptor {
            tier,
            slot,
            degree: current.degree + 1,
        })
    }

    fn alloc_slot(&mut self, tier: usize) -> Result<u32> {
        let slot = self.next_slot[tier];
        if slot as u64 > SLOT_MASK {
            return Err(self.overflow());
        }
        self.next_slot[tier] = slot + 1;
        self.pool.allocated_records.fetch_add(
            self.pool.schedule.capacity(tier) as u64,
            Ordering::Relaxed,
        );
        Ok(slot)
    }

    fn write(&self, tier: usize, slot: u32, index: u32, value: u64) -> Result<()> {
        let base = slot as usize * self.pool.schedule.capacity(tier) as usize;
        let (word, fresh) = self.pool.tiers[tier]
            .get_or_alloc(base + index as usize)
            .ok_or_else(|| self.overflow())?;
        if fresh {
            self.stats.tier_shard_allocated(tier);
        }
        word.store(value, Ordering::Relaxed);
        Ok(())
    }

    fn descriptor_word(&self, node: u32) -> Result<(&AtomicU64, bool)> {
        self.pool
            .descriptors
            .get_or_alloc(node as usize)
            .ok_or_else(|| self.overflow())
    }

    /// The pool's bounds are derived from the segment capacity, so running
    /// out of room means the caller broke the capacity contract.
    fn overflow(&self) -> GraphError {
        GraphError::CapacityExceeded {
            segment: self.segment_id,
            capacity: self.pool.schedule.max_edges(),
        }
    }
}

// ── Compact Pool ───────────────────────────────────────────────────

/// Exact-size immutable layout for an optimized segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompactPool {
    /// `offsets[n]..offsets[n + 1]` indexes node n's records.
    offsets: Box<[u32]>,
    records: Box<[u64]>,
}

impl CompactPool {
    pub(crate) fn new(offsets: Vec<u32>, records: Vec<u64>) -> Self {
        Self {
            offsets: offsets.into_boxed_slice(),
            records: records.into_boxed_slice(),
        }
    }

    #[inline]
    pub(crate) fn span(&self, node: u32) -> NodeSpan {
        let node = node as usize;
        match (self.offsets.get(node), self.offsets.get(node + 1)) {
            (Some(&start), Some(&end)) => NodeSpan {
                tier: 0,
                base: start as usize,
                degree: end - start,
            },
            _ => NodeSpan::default(),
        }
    }

    #[inline]
    pub(crate) fn record(&self, span: &NodeSpan, index: u32) -> Option<u64> {
        if index >= span.degree {
            return None;
        }
        self.records.get(span.base + index as usize).copied()
    }

    pub(crate) fn num_records(&self) -> usize {
        self.records.len()
    }
}

// ── Adjacency View ─────────────────────────────────────────────────

/// The layout a segment currently exposes to readers.
pub(crate) enum AdjacencyView {
    Tiered(Arc<TieredPool>),
    Compact(CompactPool),
}

impl AdjacencyView {
    #[inline]
    pub(crate) fn span(&self, node: u32) -> NodeSpan {
        match self {
            AdjacencyView::Tiered(pool) => pool.span(node),
            AdjacencyView::Compact(pool) => pool.span(node),
        }
    }

    #[inline]
    pub(crate) fn record(&self, span: &NodeSpan, index: u32) -> Option<u64> {
        match self {
            AdjacencyView::Tiered(pool) => pool.record(span, index),
            AdjacencyView::Compact(pool) => pool.record(span, index),
        }
    }

    pub(crate) fn is_compact(&self) -> bool {
        matches!(self, AdjacencyView::Compact(_))
    }

    /// Record slots held by this layout, including tier slack.
    pub(crate) fn allocated_records(&self) -> u64 {
        match self {
            AdjacencyView::Tiered(pool) => pool.allocated_records(),
            AdjacencyView::Compact(pool) => pool.num_records() as u64,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::CounterStats;

    fn make_pool(initial: u32, max_edges: u32) -> (Arc<TieredPool>, PoolWriter, Arc<CounterStats>) {
        let schedule = Arc::new(TierSchedule::with_initial(initial, max_edges));
        let pool = Arc::new(TieredPool::new(schedule, max_edges as usize));
        let stats = Arc::new(CounterStats::new());
        let writer = PoolWriter::new(0, pool.clone(), stats.clone());
        (pool, writer, stats)
    }

    fn read_all(pool: &TieredPool, node: u32) -> Vec<u64> {
        let span = pool.span(node);
        (0..span.degree).map(|i| pool.record(&span, i).unwrap()).collect()
    }

    #[test]
    fn test_descriptor_pack_roundtrip() {
        let desc = Descriptor {
            tier: 26,
            slot: (1 << 26) - 1,
            degree: u32::MAX,
        };
        assert_eq!(Descriptor::unpack(desc.pack()), desc);
        assert_eq!(Descriptor::unpack(0).degree, 0);
    }

    #[test]
    fn test_append_within_first_tier() {
        let (pool, mut writer, _) = make_pool(4, 100);
        for i in 0..4 {
            assert_eq!(writer.append(0, 10 + i).unwrap(), i as u32 + 1);
        }
        assert_eq!(read_all(&pool, 0), vec![10, 11, 12, 13]);
        assert_eq!(pool.span(0).tier, 0);
        assert_eq!(pool.allocated_records(), 4);
    }

    #[test]
    fn test_promotion_preserves_order() {
        let (pool, mut writer, stats) = make_pool(2, 100);
        for i in 0..11 {
            writer.append(7, i).unwrap();
        }
        assert_eq!(read_all(&pool, 7), (0..11).collect::<Vec<_>>());
        // 2 -> 4 -> 8 -> 16
        assert_eq!(pool.span(7).tier, 3);
        assert_eq!(stats.snapshot().tier_promotions, vec![0, 1, 1, 1]);
        assert_eq!(pool.allocated_records(), 2 + 4 + 8 + 16);
    }

    #[test]
    fn test_interleaved_nodes_stay_separate() {
        let (pool, mut writer, _) = make_pool(2, 100);
        for i in 0..6u64 {
            writer.append(0, 100 + i).unwrap();
            writer.append(1, 200 + i).unwrap();
            if i % 2 == 0 {
                writer.append(2, 300 + i).unwrap();
            }
        }
        assert_eq!(read_all(&pool, 0), (100..106).collect::<Vec<_>>());
        assert_eq!(read_all(&pool, 1), (200..206).collect::<Vec<_>>());
        assert_eq!(read_all(&pool, 2), vec![300, 302, 304]);
    }

    #[test]
    fn test_old_span_survives_promotion() {
        let (pool, mut writer, _) = make_pool(2, 100);
        writer.append(0, 1).unwrap();
        writer.append(0, 2).unwrap();
        let pinned = pool.span(0);

        writer.append(0, 3).unwrap();
        assert_eq!(pool.span(0).tier, 1);

        // The abandoned tier-0 slot still reads back intact
        assert_eq!(pool.record(&pinned, 0), Some(1));
        assert_eq!(pool.record(&pinned, 1), Some(2));
        assert_eq!(pool.record(&pinned, 2), None);
    }

    #[test]
    fn test_unknown_node_has_empty_span() {
        let (pool, _, _) = make_pool(4, 100);
        assert_eq!(pool.span(3).degree, 0);
        assert_eq!(pool.span(10_000).degree, 0);
    }

    #[test]
    fn test_shard_allocation_is_reported() {
        let (pool, mut writer, stats) = make_pool(4, 100);
        writer.append(0, 1).unwrap();
        writer.append(1, 1).unwrap();
        assert_eq!(stats.snapshot().tier_shards, vec![1]);
        assert_eq!(pool.allocated_shards()[0], 1);
    }

    #[test]
    fn test_compact_pool_spans() {
        let pool = CompactPool::new(vec![0, 2, 2, 5], vec![1, 2, 3, 4, 5]);
        assert_eq!(pool.num_records(), 5);
        let span = pool.span(2);
        assert_eq!(span.degree, 3);
        assert_eq!(pool.record(&span, 0), Some(3));
        assert_eq!(pool.record(&span, 3), None);
        assert_eq!(pool.span(1).degree, 0);
        assert_eq!(pool.span(3).degree, 0);
    }
}
