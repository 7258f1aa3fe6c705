//! Edge record codec.
//!
//! Every edge stored in a segment is a single `u64`: the right-node id in
//! the low bits and the edge-type tag in the top `type_bits` bits. The
//! split is fixed per store instance by `GraphConfig::edge_type_bits`.
//!
//! ```text
//!  63            64-type_bits                                   0
//! +----------------+---------------------------------------------+
//! |   edge type    |                right node id                |
//! +----------------+---------------------------------------------+
//! ```

use crate::error::{GraphError, Result};

/// Widest edge-type tag supported (the tag is a `u8`).
pub const MAX_EDGE_TYPE_BITS: u32 = 8;

/// A decoded edge as seen by readers: right node plus type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub right: u64,
    pub edge_type: u8,
}

impl Edge {
    pub fn new(right: u64, edge_type: u8) -> Self {
        Self { right, edge_type }
    }
}

/// Packs (right id, edge type) into one record and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeCodec {
    type_bits: u32,
    id_mask: u64,
}

impl EdgeCodec {
    /// Create a codec reserving `type_bits` high bits for the type tag.
    pub fn new(type_bits: u32) -> Result<Self> {
        if type_bits > MAX_EDGE_TYPE_BITS {
            return Err(GraphError::InvalidConfig(format!(
                "edge_type_bits must be <= {MAX_EDGE_TYPE_BITS}, got {type_bits}"
            )));
        }
        let id_mask = if type_bits == 0 {
            u64::MAX
        } else {
            u64::MAX >> type_bits
        };
        Ok(Self { type_bits, id_mask })
    }

    /// Number of bits reserved for the type tag.
    pub fn type_bits(&self) -> u32 {
        self.type_bits
    }

    /// Largest right-node id that round-trips.
    pub fn max_right_id(&self) -> u64 {
        self.id_mask
    }

    /// Largest edge type that round-trips.
    pub fn max_edge_type(&self) -> u8 {
        if self.type_bits == 0 {
            0
        } else {
            (u16::MAX >> (16 - self.type_bits)) as u8
        }
    }

    /// Encode, rejecting ids or tags that would be truncated.
    #[inline]
    pub fn encode(&self, right: u64, edge_type: u8) -> Result<u64> {
        if right > self.id_mask {
            return Err(GraphError::IdOutOfRange {
                id: right,
                max: self.id_mask,
            });
        }
        if edge_type > self.max_edge_type() {
            return Err(GraphError::EdgeTypeOverflow {
                edge_type,
                bits: self.type_bits,
            });
        }
        if self.type_bits == 0 {
            return Ok(right);
        }
        Ok(((edge_type as u64) << (64 - self.type_bits)) | right)
    }

    #[inline]
    pub fn decode(&self, record: u64) -> Edge {
        let edge_type = if self.type_bits == 0 {
            0
        } else {
            (record >> (64 - self.type_bits)) as u8
        };
        Edge {
            right: record & self.id_mask,
            edge_type,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
