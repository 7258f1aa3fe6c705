//! bigraph: segmented, in-memory bipartite graph store.
//!
//! One writer appends `(left, right, type)` edges into a bounded live
//! segment; full segments are sealed, repacked and eventually evicted so
//! memory stays capped at `max_num_segments` segments. Any number of
//! readers traverse or uniformly sample a left node's edges from an
//! immutable snapshot without blocking the writer.
//!
//! ```no_run
//! use bigraph::{GraphConfig, SegmentStore};
//! use rand::SeedableRng;
//!
//! let mut store = SegmentStore::new(GraphConfig::new(4, 1 << 16)).unwrap();
//! store.add_edge(42, 7, 1).unwrap();
//!
//! let reader = store.reader();
//! let mut ctx = reader.context();
//! let neighbors: Vec<u64> = ctx.query_edges(42).map(|e| e.right).collect();
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let sample = ctx.sample_edge(42, &mut rng);
//! # let _ = (neighbors, sample);
//! ```

pub mod codec;
pub mod config;
pub mod cursor;
pub mod error;
pub mod metrics;
pub mod optimizer;
pub mod segment;
pub mod snapshot;
pub mod store;

pub use codec::{Edge, EdgeCodec};
pub use config::GraphConfig;
pub use cursor::{MultiSegmentCursor, MultiSegmentSampler};
pub use error::{GraphError, Result};
pub use metrics::{CounterStats, NoopStats, StatsReceiver, StatsSnapshot};
pub use optimizer::OptimizeReport;
pub use segment::{Segment, SegmentState, SegmentStats, TierSchedule};
pub use snapshot::ReaderSnapshot;
pub use store::{QueryContext, SegmentStore, StoreReader};
