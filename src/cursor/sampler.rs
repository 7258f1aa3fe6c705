use std::sync::Arc;

use rand::Rng;

use super::MultiSegmentCursor;
use crate::codec::{Edge, EdgeCodec};
use crate::snapshot::ReaderSnapshot;

/// Uniform random edge of one left node across a snapshot's segments.
///
/// Two-level draw: pick a segment with probability proportional to the
/// node's degree in it, then a uniform index within that segment. Each
/// edge ends up with probability `1 / total_degree`. No edge list is
/// materialized; each draw is O(log segments).
pub struct MultiSegmentSampler {
    cursor: MultiSegmentCursor,
    /// Running degree totals, one per segment holding the node.
    cumulative: Vec<u64>,
}

impl MultiSegmentSampler {
    pub fn new(codec: EdgeCodec, max_num_segments: usize) -> Self {
        Self {
            cursor: MultiSegmentCursor::new(codec, max_num_segments),
            cumulative: Vec::with_capacity(max_num_segments),
        }
    }

    /// Re-target at `left` within `snapshot`. Returns the total degree.
    pub(crate) fn reset(&mut self, snapshot: Arc<ReaderSnapshot>, left: u64) -> u64 {
        self.cursor.reset(snapshot, left);
        self.cumulative.clear();
        let mut total = 0u64;
        for &degree in self.cursor.degrees() {
            total += degree as u64;
            self.cumulative.push(total);
        }
        total
    }

    pub fn degree(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// One uniform draw. `None` when the node has no edges.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Edge> {
        let total = self.degree();
        if total == 0 {
            return None;
        }
        let target = rng.gen_range(0..total);
        let slot = self.cumulative.partition_point(|&c| c <= target);
        let degree = *self.cursor.degrees().get(slot)?;
        let index = rng.gen_range(0..degree);
        self.cursor.edge_at(slot, index)
    }

    /// `k` independent draws (with replacement) appended to `out`.
    /// Returns the number of edges appended.
    pub fn sample_into<R: Rng + ?Sized>(&self, k: usize, rng: &mut R, out: &mut Vec<Edge>) -> usize {
        if self.degree() == 0 {
            return 0;
        }
        let before = out.len();
        out.extend((0..k).filter_map(|_| self.sample(rng)));
        out.len() - before
    }

    pub fn release(&mut self) {
        self.cursor.release();
        self.cumulative.clear();
    }

    pub fn cursor_allocations(&self) -> usize {
        self.cursor.cursor_allocations()
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::metrics::default_stats;
    use crate::segment::{SegmentWriter, TierSchedule};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn two_segment_snapshot() -> Arc<ReaderSnapshot> {
        let config = GraphConfig::new(4, 100);
        let schedule = Arc::new(TierSchedule::from_config(&config));
        let mut first = SegmentWriter::new(0, &config, schedule.clone(), default_stats());
        let mut second = SegmentWriter::new(1, &config, schedule, default_stats());
        // Node 7: one edge in the first segment, three in the second
        first.add_edge(7, 100).unwrap();
        for right in 200..203 {
            second.add_edge(7, right).unwrap();
        }
        Arc::new(ReaderSnapshot::new(
            1,
            vec![first.segment().clone(), second.segment().clone()],
            1,
        ))
    }

    #[test]
    fn test_every_edge_is_reachable() {
        let mut sampler = MultiSegmentSampler::new(EdgeCodec::new(0).unwrap(), 4);
        assert_eq!(sampler.reset(two_segment_snapshot(), 7), 4);

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..200 {
            seen.insert(sampler.sample(&mut rng).unwrap().right);
        }
        assert_eq!(seen.into_iter().collect::<Vec<_>>(), vec![100, 200, 201, 202]);
    }

    #[test]
    fn test_absent_node_samples_none() {
        let mut sampler = MultiSegmentSampler::new(EdgeCodec::new(0).unwrap(), 4);
        assert_eq!(sampler.reset(two_segment_snapshot(), 8), 0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(sampler.sample(&mut rng), None);

        let mut out = Vec::new();
        assert_eq!(sampler.sample_into(5, &mut rng, &mut out), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_sample_into_appends_k() {
        let mut sampler = MultiSegmentSampler::new(EdgeCodec::new(0).unwrap(), 4);
        sampler.reset(two_segment_snapshot(), 7);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut out = vec![Edge::new(0, 0)];
        assert_eq!(sampler.sample_into(10, &mut rng, &mut out), 10);
        assert_eq!(out.len(), 11);
    }
}
