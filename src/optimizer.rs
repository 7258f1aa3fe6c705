//! Segment optimizer: repacks a sealed segment into its compact layout.
//!
//! 1. Walk every dense id of the sealed segment in order
//! 2. Copy its records into one exact-size array (offsets + records)
//! 3. Verify the copy covers the segment's edge count
//! 4. Advance the segment to `Optimized` and swap the layout in
//!
//! Readers that pinned the tiered layout keep reading it; the tiered
//! buffers are freed when the last of them lets go.
//!
//! Optimization runs either inline on the writer thread or on a single
//! background worker fed through a channel (`optimize_in_background`).

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, SendError, Sender};

use crate::error::{GraphError, Result};
use crate::metrics::StatsReceiver;
use crate::segment::pool::CompactPool;
use crate::segment::{Segment, SegmentState};

const WORKER_THREAD_NAME: &str = "bigraph-optimizer";

// ── Optimize Segment ───────────────────────────────────────────────

/// Outcome of one segment repack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizeReport {
    pub segment_id: u32,
    pub nodes: u32,
    pub edges: u64,
    /// Tier slack released by the repack.
    pub reclaimed_records: u64,
    pub duration: Duration,
}

/// Repack a sealed segment. Fails without touching the segment unless it
/// is `Sealed` and its records add up to its edge count.
///
/// Complexity: O(E) for E edges in the segment
pub fn optimize_segment(segment: &Segment) -> Result<OptimizeReport> {
    let started = Instant::now();
    let state = segment.state();
    if state != SegmentState::Sealed {
        return Err(GraphError::InvalidTransition {
            segment: segment.id(),
            from: state,
            to: SegmentState::Optimized,
        });
    }

    let view = segment.view();
    let nodes = segment.node_count();
    let expected = segment.edge_count() as usize;

    let mut offsets = Vec::with_capacity(nodes as usize + 1);
    let mut records = Vec::with_capacity(expected);
    offsets.push(0u32);
    for node in 0..nodes {
        let span = view.span(node);
        for i in 0..span.degree {
            let record = view.record(&span, i).ok_or_else(|| {
                GraphError::Optimizer(format!(
                    "segment {}: node {node} lost record {i} of {}",
                    segment.id(),
                    span.degree
                ))
            })?;
            records.push(record);
        }
        offsets.push(records.len() as u32);
    }

    if records.len() != expected {
        return Err(GraphError::Optimizer(format!(
            "segment {}: repacked {} records, expected {expected}",
            segment.id(),
            records.len()
        )));
    }

    let reclaimed_records = view
        .allocated_records()
        .saturating_sub(records.len() as u64);
    drop(view);

    segment.transition(SegmentState::Optimized)?;
    segment.install_compact(CompactPool::new(offsets, records));

    Ok(OptimizeReport {
        segment_id: segment.id(),
        nodes,
        edges: expected as u64,
        reclaimed_records,
        duration: started.elapsed(),
    })
}

/// Optimize and report. Failures are logged; the segment keeps serving
/// its tiered layout.
pub(crate) fn run_optimize(segment: &Segment, stats: &dyn StatsReceiver) {
    if segment.state() == SegmentState::Evicted {
        tracing::debug!(segment_id = segment.id(), "Skipping optimize of evicted segment");
        return;
    }
    match optimize_segment(segment) {
        Ok(report) => {
            stats.segment_optimized(report.segment_id, report.duration, report.edges);
            tracing::debug!(
                segment_id = report.segment_id,
                nodes = report.nodes,
                edges = report.edges,
                reclaimed_records = report.reclaimed_records,
                duration_us = report.duration.as_micros() as u64,
                "Segment optimized"
            );
        }
        // Evicted while the repack was running
        Err(GraphError::InvalidTransition {
            from: SegmentState::Evicted,
            ..
        }) => {
            tracing::debug!(segment_id = segment.id(), "Segment evicted during optimize");
        }
        Err(e) => {
            tracing::error!(segment_id = segment.id(), error = %e, "Segment optimization failed");
        }
    }
}

// ── Dispatch ───────────────────────────────────────────────────────

/// Where sealed segments go to be optimized.
pub(crate) enum Optimizer {
    Inline(Arc<dyn StatsReceiver>),
    Background(OptimizerWorker),
}

impl Optimizer {
    pub(crate) fn new(background: bool, stats: Arc<dyn StatsReceiver>) -> Result<Self> {
        if background {
            Ok(Optimizer::Background(OptimizerWorker::spawn(stats)?))
        } else {
            Ok(Optimizer::Inline(stats))
        }
    }

    pub(crate) fn submit(&self, segment: Arc<Segment>) {
        match self {
            Optimizer::Inline(stats) => run_optimize(&segment, stats.as_ref()),
            Optimizer::Background(worker) => worker.submit(segment),
        }
    }

    /// Block until everything submitted so far has been processed.
    pub(crate) fn wait_idle(&self) {
        if let Optimizer::Background(worker) = self {
            worker.wait_idle();
        }
    }
}

// ── Background Worker ──────────────────────────────────────────────

enum Job {
    Optimize(Arc<Segment>),
    Barrier(Sender<()>),
}

/// Single named thread draining an unbounded job queue in FIFO order.
///
/// Dropping the worker closes the queue; the thread finishes the jobs
/// already queued and is joined.
pub struct OptimizerWorker {
    sender: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
    stats: Arc<dyn StatsReceiver>,
}

impl OptimizerWorker {
    pub fn spawn(stats: Arc<dyn StatsReceiver>) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let worker_stats = stats.clone();
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker_loop(receiver, worker_stats))?;
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            stats,
        })
    }

    pub fn submit(&self, segment: Arc<Segment>) {
        let Some(sender) = &self.sender else {
            return run_optimize(&segment, self.stats.as_ref());
        };
        if let Err(SendError(job)) = sender.send(Job::Optimize(segment)) {
            tracing::warn!("Optimizer worker is gone, optimizing inline");
            if let Job::Optimize(segment) = job {
                run_optimize(&segment, self.stats.as_ref());
            }
        }
    }

    pub fn wait_idle(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        if sender.send(Job::Barrier(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }
}

impl Drop for OptimizerWorker {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Optimizer worker panicked");
            }
        }
    }
}

fn worker_loop(receiver: Receiver<Job>, stats: Arc<dyn StatsReceiver>) {
    tracing::debug!("Optimizer worker started");
    for job in receiver {
        match job {
            Job::Optimize(segment) => run_optimize(&segment, stats.as_ref()),
            Job::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("Optimizer worker stopped");
}

// ── Tests ──────────────────────────────────────────────────────────
