//! Tier schedule for power-law adjacency storage.
//!
//! A node's records live in exactly one fixed-size slot of one tier. When
//! the slot fills up, the node moves to a slot of the next tier, which is
//! twice as large. The first tier is sized from the power-law exponent so
//! that most nodes never leave it:
//!
//! ```text
//! cap0 = ceil(4 ^ (1 / (alpha - 1)))      // degree where d^(1-alpha) = 1/4
//! cap(t + 1) = 2 * cap(t)                 // until cap(t) >= max edges per segment
//! ```
//!
//! For `alpha = 2.0` this gives tiers of 4, 8, 16, ... records.

use crate::config::GraphConfig;

/// Hard upper bound on the number of tiers. Node descriptors store the
/// tier in 6 bits; doubling from 1 up to `MAX_EDGES_PER_SEGMENT` needs 27.
pub const MAX_TIERS: usize = 32;

/// First-tier capacity never exceeds this, whatever the exponent says.
const MAX_INITIAL_CAPACITY: u32 = 256;

/// Share of nodes expected to overflow the first tier.
const FIRST_TIER_OVERFLOW: f64 = 0.25;

/// Monotonic per-tier slot capacities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierSchedule {
    capacities: Vec<u32>,
    max_edges: u32,
}

impl TierSchedule {
    /// Derive the schedule from a validated config.
    pub fn from_config(config: &GraphConfig) -> Self {
        let alpha = config.left_power_law_exponent;
        let raw = (1.0 / FIRST_TIER_OVERFLOW).powf(1.0 / (alpha - 1.0)).ceil();
        let ceiling = config
            .expected_max_left_degree
            .min(config.max_num_edges_per_segment)
            .min(MAX_INITIAL_CAPACITY)
            .max(1);
        let initial = if raw.is_finite() {
            (raw as u64).clamp(1, ceiling as u64) as u32
        } else {
            ceiling
        };
        Self::with_initial(initial, config.max_num_edges_per_segment)
    }

    /// Doubling schedule starting at `initial` that covers `max_edges`.
    pub fn with_initial(initial: u32, max_edges: u32) -> Self {
        let mut capacities = vec![initial.max(1)];
        while let Some(&last) = capacities.last() {
            if last >= max_edges || capacities.len() == MAX_TIERS {
                break;
            }
            capacities.push(last.saturating_mul(2));
        }
        Self {
            capacities,
            max_edges,
        }
    }

    #[inline]
    pub fn capacity(&self, tier: usize) -> u32 {
        self.capacities[tier]
    }

    /// Segment capacity the schedule was built for.
    pub fn max_edges(&self) -> u32 {
        self.max_edges
    }

    pub fn num_tiers(&self) -> usize {
        self.capacities.len()
    }

    pub fn capacities(&self) -> &[u32] {
        &self.capacities
    }

    /// Upper bound on records a segment can ever place in `tier`.
    ///
    /// Every node in tier 0 holds at least one edge; every node that
    /// reached tier t > 0 holds more than `cap(t-1)` edges. Abandoned slots
    /// still count, since slots are never reused.
    pub fn max_records(&self, tier: usize) -> usize {
        let edges = self.max_edges as usize;
        let cap = self.capacity(tier) as usize;
        if tier == 0 {
            return edges * cap;
        }
        let entry_degree = self.capacity(tier - 1) as usize + 1;
        (edges / entry_degree).max(1) * cap
    }
}

// ── Tests ──────────────────────────────────────────────────────────
