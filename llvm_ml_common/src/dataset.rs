//! The joined record a dataset build emits: one graph paired with its
//! measured metrics.

use serde::{Deserialize, Serialize};

use crate::graph::Graph;
use crate::metrics::MetricsRecord;

/// One row of an assembled dataset (the original schema's `DataPiece`).
///
/// Invariants enforced by the Dataset Assembler before a `DatasetEntry` is
/// admitted: `metrics.measured_cycles > 0`, `graph.nodes` non-empty,
/// `cov <= max_cov`, and no structurally-equal graph retained twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub id: String,
    pub cov: f64,
    pub graph: Graph,
    pub metrics: MetricsRecord,
}
