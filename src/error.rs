//! Error types for the segmented graph store

use thiserror::Error;

use crate::segment::SegmentState;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    /// A segment was asked to take an edge after reaching its cap.
    /// The store always rolls over first, so this is an invariant violation.
    #[error("Segment {segment} is full ({capacity} edges)")]
    CapacityExceeded { segment: u32, capacity: u32 },

    #[error("Node id {id} out of range (max {max})")]
    IdOutOfRange { id: u64, max: u64 },

    #[error("Edge type {edge_type} does not fit in {bits} bits")]
    EdgeTypeOverflow { edge_type: u8, bits: u32 },

    /// A batch insert stopped at a rejected edge. Edges before it stay added.
    #[error("Batch stopped after {added} edges: {source}")]
    BatchRejected {
        added: usize,
        #[source]
        source: Box<GraphError>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Segment {segment}: illegal transition {from:?} -> {to:?}")]
    InvalidTransition {
        segment: u32,
        from: SegmentState,
        to: SegmentState,
    },

    #[error("Optimizer error: {0}")]
    Optimizer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    /// Stable error code for services wrapping the store.
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            GraphError::IdOutOfRange { .. } => "ID_OUT_OF_RANGE",
            GraphError::EdgeTypeOverflow { .. } => "EDGE_TYPE_OVERFLOW",
            GraphError::BatchRejected { source, .. } => source.code(),
            GraphError::InvalidConfig(_) => "INVALID_CONFIG",
            GraphError::InvalidTransition { .. } => "INVALID_TRANSITION",
            _ => "INTERNAL_ERROR",
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let err = GraphError::IdOutOfRange { id: 10, max: 5 };
        assert_eq!(err.code(), "ID_OUT_OF_RANGE");

        let err = GraphError::CapacityExceeded { segment: 3, capacity: 8 };
        assert_eq!(err.code(), "CAPACITY_EXCEEDED");

        let err = GraphError::Optimizer("boom".into());
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_display_includes_context() {
        let err = GraphError::EdgeTypeOverflow { edge_type: 9, bits: 3 };
        assert_eq!(err.to_string(), "Edge type 9 does not fit in 3 bits");
    }

    #[test]
    fn test_batch_rejection_reports_inner_code() {
        let err = GraphError::BatchRejected {
            added: 4,
            source: Box::new(GraphError::IdOutOfRange { id: 10, max: 5 }),
        };
        assert_eq!(err.code(), "ID_OUT_OF_RANGE");
        assert_eq!(
            err.to_string(),
            "Batch stopped after 4 edges: Node id 10 out of range (max 5)"
        );
    }
}
