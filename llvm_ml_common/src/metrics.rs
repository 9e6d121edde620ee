//! Persisted per-block measurement record.

use serde::{Deserialize, Serialize};

use crate::result::BenchmarkResult;

/// Everything the Sandboxed Runner + Trial Aggregator produce for one
/// basic block, in the shape written to a `.cbuf` metrics file.
///
/// `source` preserves the sample assembly text verbatim, so a metrics
/// record alone is enough to reproduce the measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub measured_cycles: u64,
    pub num_repeat: u32,
    pub source: String,
    pub noise_samples: Vec<BenchmarkResult>,
    pub workload_samples: Vec<BenchmarkResult>,
}

impl MetricsRecord {
    pub fn new(source: impl Into<String>, num_repeat: u32) -> Self {
        Self {
            measured_cycles: 0,
            num_repeat,
            source: source.into(),
            noise_samples: Vec::new(),
            workload_samples: Vec::new(),
        }
    }
}
