//! Construction-time parameter bundle for a `SegmentStore`.
//!
//! One bundle fixes segment sizing, the tier schedule hints and the edge
//! codec width for the lifetime of a store. The bundle is serde-friendly
//! so a wrapping service can keep it next to its own settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::MAX_EDGE_TYPE_BITS;
use crate::error::{GraphError, Result};

/// Upper bound on edges per segment. Slot indices in a node descriptor
/// are 26 bits wide and tier 0 can hold one slot per edge.
pub const MAX_EDGES_PER_SEGMENT: u32 = 1 << 26;

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Resident segment cap. The oldest segment is evicted beyond it.
    pub max_num_segments: usize,
    /// Edges a segment accepts before the store rolls over.
    pub max_num_edges_per_segment: u32,
    /// Expected distinct left nodes per segment (sizes the id table).
    pub expected_num_left_nodes: u32,
    /// Expected maximum left degree (caps the first tier).
    pub expected_max_left_degree: u32,
    /// Power-law exponent of the left degree distribution.
    pub left_power_law_exponent: f64,
    /// Expected distinct right nodes. Recorded for wrapping services.
    pub expected_num_right_nodes: u32,
    /// High bits of each record reserved for the edge type.
    pub edge_type_bits: u32,
    /// Run segment optimization on a worker thread instead of inline.
    pub optimize_in_background: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_num_segments: 8,
            max_num_edges_per_segment: 1 << 20,
            expected_num_left_nodes: 1 << 16,
            expected_max_left_degree: 1 << 10,
            left_power_law_exponent: 2.0,
            expected_num_right_nodes: 1 << 18,
            edge_type_bits: 4,
            optimize_in_background: true,
        }
    }
}

impl GraphConfig {
    pub fn new(max_num_segments: usize, max_num_edges_per_segment: u32) -> Self {
        Self {
            max_num_segments,
            max_num_edges_per_segment,
            ..Self::default()
        }
    }

    pub fn expected_num_left_nodes(mut self, n: u32) -> Self {
        self.expected_num_left_nodes = n;
        self
    }

    pub fn expected_max_left_degree(mut self, degree: u32) -> Self {
        self.expected_max_left_degree = degree;
        self
    }

    pub fn left_power_law_exponent(mut self, exponent: f64) -> Self {
        self.left_power_law_exponent = exponent;
        self
    }

    pub fn expected_num_right_nodes(mut self, n: u32) -> Self {
        self.expected_num_right_nodes = n;
        self
    }

    pub fn edge_type_bits(mut self, bits: u32) -> Self {
        self.edge_type_bits = bits;
        self
    }

    pub fn optimize_in_background(mut self, enabled: bool) -> Self {
        self.optimize_in_background = enabled;
        self
    }

    /// Check every field; the store refuses to start on an invalid bundle.
    pub fn validate(&self) -> Result<()> {
        if self.max_num_segments == 0 {
            return Err(invalid("max_num_segments must be >= 1"));
        }
        if self.max_num_edges_per_segment == 0
            || self.max_num_edges_per_segment > MAX_EDGES_PER_SEGMENT
        {
            return Err(invalid(format!(
                "max_num_edges_per_segment must be in 1..={MAX_EDGES_PER_SEGMENT}, got {}",
                self.max_num_edges_per_segment
            )));
        }
        if self.expected_max_left_degree == 0 {
            return Err(invalid("expected_max_left_degree must be >= 1"));
        }
        if !self.left_power_law_exponent.is_finite() || self.left_power_law_exponent <= 1.0 {
            return Err(invalid(format!(
                "left_power_law_exponent must be finite and > 1, got {}",
                self.left_power_law_exponent
            )));
        }
        if self.edge_type_bits > MAX_EDGE_TYPE_BITS {
            return Err(invalid(format!(
                "edge_type_bits must be <= {MAX_EDGE_TYPE_BITS}, got {}",
                self.edge_type_bits
            )));
        }
        Ok(())
    }

    /// Read config from a JSON file.
    pub fn read_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write config to a JSON file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> GraphError {
    GraphError::InvalidConfig(msg.into())
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_is_valid() {
        GraphConfig::default().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let cases = [
            GraphConfig::new(0, 10),
            GraphConfig::new(2, 0),
            GraphConfig::new(2, MAX_EDGES_PER_SEGMENT + 1),
            GraphConfig::new(2, 10).expected_max_left_degree(0),
            GraphConfig::new(2, 10).left_power_law_exponent(1.0),
            GraphConfig::new(2, 10).left_power_law_exponent(f64::NAN),
            GraphConfig::new(2, 10).edge_type_bits(9),
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(GraphError::InvalidConfig(_))),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.json");
        let config = GraphConfig::new(4, 1000)
            .edge_type_bits(2)
            .optimize_in_background(false);
        config.write_to(&path).unwrap();

        let loaded = GraphConfig::read_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: GraphConfig =
            serde_json::from_str(r#"{"max_num_segments": 3}"#).unwrap();
        assert_eq!(config.max_num_segments, 3);
        assert_eq!(
            config.max_num_edges_per_segment,
            GraphConfig::default().max_num_edges_per_segment
        );
    }

    #[test]
    fn test_read_from_rejects_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, r#"{"max_num_segments": 0}"#).unwrap();
        assert!(matches!(
            GraphConfig::read_from(&path),
            Err(GraphError::InvalidConfig(_))
        ));
    }
}
