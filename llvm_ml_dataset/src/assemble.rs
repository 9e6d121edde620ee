//! Dataset Assembler.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use llvm_ml_common::dataset::DatasetEntry;
use llvm_ml_common::graph::Graph;
use llvm_ml_common::metrics::MetricsRecord;
use llvm_ml_common::result::BenchmarkResult;
use llvm_ml_common::stat::coefficient_of_variation;

use crate::error::DatasetError;

/// Concurrently load every `.cbuf` graph file and every `.cbuf` metrics
/// file (keyed by filename stem) from two directories, pair by stem,
/// compute CoV, filter, and deduplicate. `max_cov_fraction` is the
/// configured `--max-cov` threshold expressed as a fraction (e.g. `0.10`
/// for the default 10%).
pub fn assemble(
    graphs_dir: &Path,
    metrics_dir: &Path,
    max_cov_fraction: f64,
) -> Result<Vec<DatasetEntry>, DatasetError> {
    let (graphs, metrics) = std::thread::scope(|scope| {
        let graphs_handle = scope.spawn(|| load_graphs(graphs_dir));
        let metrics_handle = scope.spawn(|| load_metrics(metrics_dir));
        (
            graphs_handle.join().expect("graph loader panicked"),
            metrics_handle.join().expect("metrics loader panicked"),
        )
    });
    let graphs = graphs?;
    let metrics = metrics?;

    let mut entries = Vec::new();
    for (stem, graph) in &graphs {
        let Some(record) = metrics.get(stem) else {
            continue;
        };
        if let Some(entry) = build_entry(stem, graph, record, max_cov_fraction) {
            entries.push(entry);
        }
    }

    Ok(dedup(entries))
}

fn build_entry(
    stem: &str,
    graph: &Graph,
    metrics: &MetricsRecord,
    max_cov_fraction: f64,
) -> Option<DatasetEntry> {
    if metrics.measured_cycles == 0 || graph.nodes.is_empty() {
        return None;
    }

    let cov = compute_cov(metrics);
    if cov.is_nan() || cov > max_cov_fraction {
        return None;
    }

    Some(DatasetEntry {
        id: stem.to_string(),
        cov,
        graph: graph.clone(),
        metrics: metrics.clone(),
    })
}

/// Pool per-trial cycles-per-iteration from `workload_samples`, falling
/// back to `noise_samples` only if `workload_samples` is empty — a
/// compatibility path for older records that predate per-trial workload
/// sampling.
fn compute_cov(metrics: &MetricsRecord) -> f64 {
    let samples: &[BenchmarkResult] = if metrics.workload_samples.is_empty() {
        &metrics.noise_samples
    } else {
        &metrics.workload_samples
    };

    let values: Vec<f64> = samples
        .iter()
        .filter(|s| !s.failed && s.num_runs > 0)
        .map(|s| s.cycles as f64 / s.num_runs as f64)
        .collect();

    coefficient_of_variation(&values)
}

/// Among graphs comparing structurally equal, keep the one with the
/// smaller `measured_cycles` — closer to the noise floor, the more
/// reliable trial.
fn dedup(mut entries: Vec<DatasetEntry>) -> Vec<DatasetEntry> {
    let mut kept: Vec<DatasetEntry> = Vec::with_capacity(entries.len());

    entries.sort_by_key(|e| e.metrics.measured_cycles);

    'outer: for entry in entries {
        for existing in &kept {
            if existing.graph.structurally_equals(&entry.graph) {
                continue 'outer;
            }
        }
        kept.push(entry);
    }

    kept
}

fn load_graphs(dir: &Path) -> Result<HashMap<String, Graph>, DatasetError> {
    load_cbuf_dir(dir, llvm_ml_codec::graph_from_bytes)
}

fn load_metrics(dir: &Path) -> Result<HashMap<String, MetricsRecord>, DatasetError> {
    load_cbuf_dir(dir, llvm_ml_codec::metrics_from_bytes)
}

fn load_cbuf_dir<T>(
    dir: &Path,
    decode: impl Fn(&[u8]) -> Result<T, llvm_ml_codec::CodecError>,
) -> Result<HashMap<String, T>, DatasetError> {
    let mut out = HashMap::new();
    let entries =
        std::fs::read_dir(dir).map_err(|e| DatasetError::Io(dir.to_path_buf(), e))?;

    for entry in entries {
        let entry = entry.map_err(|e| DatasetError::Io(dir.to_path_buf(), e))?;
        let path: PathBuf = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("cbuf") {
            continue;
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let bytes = std::fs::read(&path).map_err(|e| DatasetError::Io(path.clone(), e))?;
        let value = decode(&bytes).map_err(|e| DatasetError::Codec(path.clone(), e))?;
        out.insert(stem, value);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cycles: u64, num_runs: u32) -> BenchmarkResult {
        BenchmarkResult {
            cycles,
            num_runs,
            ..Default::default()
        }
    }

    #[test]
    fn falls_back_to_noise_samples_when_workload_is_empty() {
        let mut metrics = MetricsRecord::new("s", 100);
        metrics.measured_cycles = 100;
        metrics.noise_samples = vec![sample(100, 100), sample(110, 100), sample(105, 100)];
        let cov = compute_cov(&metrics);
        assert!(cov > 0.0 && cov < 1.0);
    }

    #[test]
    fn prefers_workload_samples_when_present() {
        let mut metrics = MetricsRecord::new("s", 100);
        metrics.measured_cycles = 100;
        metrics.noise_samples = vec![sample(100_000, 100)];
        metrics.workload_samples = vec![sample(100, 100), sample(101, 100)];
        let cov = compute_cov(&metrics);
        assert!(cov < 0.1);
    }

    #[test]
    fn dedup_keeps_smaller_measured_cycles() {
        let graph = Graph::new("block");
        let mut a = MetricsRecord::new("block", 100);
        a.measured_cycles = 200;
        let mut b = MetricsRecord::new("block", 100);
        b.measured_cycles = 100;

        let entries = vec![
            DatasetEntry {
                id: "a".into(),
                cov: 0.01,
                graph: graph.clone(),
                metrics: a,
            },
            DatasetEntry {
                id: "b".into(),
                cov: 0.01,
                graph,
                metrics: b,
            },
        ];

        let kept = dedup(entries);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "b");
    }
}
