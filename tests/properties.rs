//! Property tests: the store against a plain Vec model.

use std::collections::BTreeMap;
use std::sync::Arc;

use bigraph::metrics::default_stats;
use bigraph::optimizer::optimize_segment;
use bigraph::segment::SegmentWriter;
use bigraph::{Edge, GraphConfig, SegmentState, SegmentStore, TierSchedule};
use proptest::prelude::*;

const NUM_LEFT: u64 = 6;

fn edges_strategy(max_len: usize) -> impl Strategy<Value = Vec<(u64, u64, u8)>> {
    prop::collection::vec((0..NUM_LEFT, 0..10_000u64, 0..4u8), 0..max_len)
}

/// Edges of `left` that should still be resident after appending `edges`
/// with rollover every `cap` edges and at most `max_segments` segments.
fn model_query(edges: &[(u64, u64, u8)], cap: usize, max_segments: usize, left: u64) -> Vec<Edge> {
    if edges.is_empty() {
        return Vec::new();
    }
    let live = (edges.len() - 1) / cap;
    let oldest = (live + 1).saturating_sub(max_segments);
    edges
        .iter()
        .enumerate()
        .filter(|(i, e)| i / cap >= oldest && e.0 == left)
        .map(|(_, e)| Edge::new(e.1, e.2))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_query_matches_model(
        edges in edges_strategy(300),
        cap in 1u32..12,
        max_segments in 1usize..5,
        exponent in prop_oneof![Just(1.5f64), Just(2.0), Just(3.0)],
    ) {
        let config = GraphConfig::new(max_segments, cap)
            .edge_type_bits(2)
            .left_power_law_exponent(exponent)
            .expected_num_left_nodes(2)
            .optimize_in_background(false);
        let mut store = SegmentStore::new(config).unwrap();
        for &(left, right, ty) in &edges {
            store.add_edge(left, right, ty).unwrap();
            prop_assert!(store.num_segments() <= max_segments);
        }

        for left in 0..NUM_LEFT {
            let expected = model_query(&edges, cap as usize, max_segments, left);
            let actual: Vec<Edge> = store.query_edges(left).collect();
            prop_assert_eq!(store.degree(left), expected.len() as u64);
            prop_assert_eq!(actual, expected);
        }

        for stats in store.segment_stats() {
            if stats.state == SegmentState::Optimized {
                prop_assert_eq!(stats.slack_records, 0);
                prop_assert_eq!(stats.allocated_records, stats.edge_count as u64);
            }
        }
    }

    #[test]
    fn prop_optimize_preserves_content(
        edges in prop::collection::vec((0..40u64, any::<u64>()), 1..400),
        initial_tier in 1u32..6,
    ) {
        let config = GraphConfig::new(2, 512).expected_num_left_nodes(4);
        let schedule = Arc::new(TierSchedule::with_initial(initial_tier, 512));
        let mut writer = SegmentWriter::new(0, &config, schedule, default_stats());

        let mut model: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
        for &(left, record) in &edges {
            writer.add_edge(left, record).unwrap();
            model.entry(left).or_default().push(record);
        }
        let segment = writer.seal().unwrap();
        optimize_segment(&segment).unwrap();
        prop_assert!(segment.is_compact());

        for (left, records) in &model {
            let internal = segment.internal_id(*left).unwrap();
            let actual: Vec<u64> = segment.edges_of(internal).collect();
            prop_assert_eq!(&actual, records);
        }
        prop_assert_eq!(segment.node_count() as usize, model.len());
        prop_assert_eq!(segment.edge_count() as usize, edges.len());
    }

    #[test]
    fn prop_restart_replays_identically(
        edges in edges_strategy(120),
        left in 0..NUM_LEFT,
    ) {
        let config = GraphConfig::new(3, 7)
            .edge_type_bits(2)
            .optimize_in_background(false);
        let mut store = SegmentStore::new(config).unwrap();
        for &(l, r, t) in &edges {
            store.add_edge(l, r, t).unwrap();
        }
        let mut ctx = store.context();
        let cursor = ctx.query_edges(left);
        let first: Vec<Edge> = cursor.by_ref().collect();
        cursor.restart();
        let second: Vec<Edge> = cursor.collect();
        prop_assert_eq!(first, second);
    }
}
