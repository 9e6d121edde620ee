//! Packed binary encoding of the record types the workspace persists to
//! `.cbuf` files: [`Graph`], [`MetricsRecord`], [`DatasetEntry`], and the
//! per-trial [`BenchmarkResult`] sample type, all via the length-tagged
//! primitives in [`crate::wire`].

use llvm_ml_common::dataset::DatasetEntry;
use llvm_ml_common::graph::{EdgeFeatures, Graph, NodeFeatures};
use llvm_ml_common::metrics::MetricsRecord;
use llvm_ml_common::result::BenchmarkResult;

use crate::error::CodecError;
use crate::wire::{Reader, Writer};

pub fn encode_benchmark_result(w: &mut Writer, r: &BenchmarkResult) {
    w.write_bool(r.failed);
    w.write_u64(r.cycles);
    w.write_u64(r.context_switches);
    w.write_u64(r.cache_misses);
    w.write_u64(r.micro_ops);
    w.write_u64(r.instructions);
    w.write_u64(r.misaligned_loads);
    w.write_u32(r.num_runs);
    w.write_u64(r.wall_time_ns);
}

pub fn decode_benchmark_result(r: &mut Reader) -> Result<BenchmarkResult, CodecError> {
    Ok(BenchmarkResult {
        failed: r.read_bool()?,
        cycles: r.read_u64()?,
        context_switches: r.read_u64()?,
        cache_misses: r.read_u64()?,
        micro_ops: r.read_u64()?,
        instructions: r.read_u64()?,
        misaligned_loads: r.read_u64()?,
        num_runs: r.read_u32()?,
        wall_time_ns: r.read_u64()?,
    })
}

fn encode_node(w: &mut Writer, n: &NodeFeatures) {
    w.write_u32(n.opcode);
    w.write_u32(n.node_id);
    w.write_bool(n.is_load);
    w.write_bool(n.is_store);
    w.write_bool(n.is_barrier);
    w.write_bool(n.is_atomic);
    w.write_bool(n.is_vector);
    w.write_bool(n.is_compute);
    w.write_bool(n.is_float);
    w.write_bool(n.is_virtual_root);
}

fn decode_node(r: &mut Reader) -> Result<NodeFeatures, CodecError> {
    Ok(NodeFeatures {
        opcode: r.read_u32()?,
        node_id: r.read_u32()?,
        is_load: r.read_bool()?,
        is_store: r.read_bool()?,
        is_barrier: r.read_bool()?,
        is_atomic: r.read_bool()?,
        is_vector: r.read_bool()?,
        is_compute: r.read_bool()?,
        is_float: r.read_bool()?,
        is_virtual_root: r.read_bool()?,
    })
}

fn encode_edge_features(w: &mut Writer, f: &EdgeFeatures) {
    w.write_bool(f.is_data);
    w.write_bool(f.is_implicit);
    w.write_bool(f.is_vector);
    w.write_bool(f.is_tile);
}

fn decode_edge_features(r: &mut Reader) -> Result<EdgeFeatures, CodecError> {
    Ok(EdgeFeatures {
        is_data: r.read_bool()?,
        is_implicit: r.read_bool()?,
        is_vector: r.read_bool()?,
        is_tile: r.read_bool()?,
    })
}

pub fn encode_graph(w: &mut Writer, g: &Graph) {
    w.write_str(&g.source);
    w.write_bool(g.has_virtual_root);
    w.write_u32(g.max_opcodes);
    w.write_list(&g.nodes, |w, n| encode_node(w, n));
    w.write_list(&g.edges, |w, e| {
        w.write_u32(e.from);
        w.write_u32(e.to);
        encode_edge_features(w, &e.features);
    });
}

pub fn decode_graph(r: &mut Reader) -> Result<Graph, CodecError> {
    let source = r.read_str()?;
    let has_virtual_root = r.read_bool()?;
    let max_opcodes = r.read_u32()?;
    let nodes = r.read_list(decode_node)?;
    let edges = r.read_list(|r| {
        let from = r.read_u32()?;
        let to = r.read_u32()?;
        let features = decode_edge_features(r)?;
        Ok(llvm_ml_common::graph::Edge { from, to, features })
    })?;

    Ok(Graph {
        source,
        has_virtual_root,
        max_opcodes,
        nodes,
        edges,
    })
}

pub fn encode_metrics(w: &mut Writer, m: &MetricsRecord) {
    w.write_u64(m.measured_cycles);
    w.write_u32(m.num_repeat);
    w.write_str(&m.source);
    w.write_list(&m.noise_samples, |w, s| encode_benchmark_result(w, s));
    w.write_list(&m.workload_samples, |w, s| encode_benchmark_result(w, s));
}

pub fn decode_metrics(r: &mut Reader) -> Result<MetricsRecord, CodecError> {
    Ok(MetricsRecord {
        measured_cycles: r.read_u64()?,
        num_repeat: r.read_u32()?,
        source: r.read_str()?,
        noise_samples: r.read_list(decode_benchmark_result)?,
        workload_samples: r.read_list(decode_benchmark_result)?,
    })
}

pub fn encode_dataset_entry(w: &mut Writer, d: &DatasetEntry) {
    w.write_str(&d.id);
    w.write_f64(d.cov);
    encode_graph(w, &d.graph);
    encode_metrics(w, &d.metrics);
}

pub fn decode_dataset_entry(r: &mut Reader) -> Result<DatasetEntry, CodecError> {
    Ok(DatasetEntry {
        id: r.read_str()?,
        cov: r.read_f64()?,
        graph: decode_graph(r)?,
        metrics: decode_metrics(r)?,
    })
}

/// Encode `graph` to a standalone `.cbuf` buffer.
pub fn graph_to_bytes(g: &Graph) -> Vec<u8> {
    let mut w = Writer::new();
    encode_graph(&mut w, g);
    w.into_bytes()
}

pub fn graph_from_bytes(bytes: &[u8]) -> Result<Graph, CodecError> {
    decode_graph(&mut Reader::new(bytes))
}

pub fn metrics_to_bytes(m: &MetricsRecord) -> Vec<u8> {
    let mut w = Writer::new();
    encode_metrics(&mut w, m);
    w.into_bytes()
}

pub fn metrics_from_bytes(bytes: &[u8]) -> Result<MetricsRecord, CodecError> {
    decode_metrics(&mut Reader::new(bytes))
}

pub fn dataset_entry_to_bytes(d: &DatasetEntry) -> Vec<u8> {
    let mut w = Writer::new();
    encode_dataset_entry(&mut w, d);
    w.into_bytes()
}

pub fn dataset_entry_from_bytes(bytes: &[u8]) -> Result<DatasetEntry, CodecError> {
    decode_dataset_entry(&mut Reader::new(bytes))
}

/// Encode a whole dataset (every entry a run produced) as one `.cbuf`
/// buffer: an outer length-tagged list of [`encode_dataset_entry`] records.
pub fn encode_dataset(w: &mut Writer, entries: &[DatasetEntry]) {
    w.write_list(entries, |w, e| encode_dataset_entry(w, e));
}

pub fn decode_dataset(r: &mut Reader) -> Result<Vec<DatasetEntry>, CodecError> {
    r.read_list(decode_dataset_entry)
}

pub fn dataset_to_bytes(entries: &[DatasetEntry]) -> Vec<u8> {
    let mut w = Writer::new();
    encode_dataset(&mut w, entries);
    w.into_bytes()
}

pub fn dataset_from_bytes(bytes: &[u8]) -> Result<Vec<DatasetEntry>, CodecError> {
    decode_dataset(&mut Reader::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use llvm_ml_common::graph::Edge;

    #[test]
    fn graph_round_trips() {
        let mut g = Graph::new("block0.s");
        g.has_virtual_root = true;
        g.add_node(NodeFeatures {
            is_virtual_root: true,
            ..Default::default()
        });
        g.add_node(NodeFeatures {
            opcode: 7,
            node_id: 1,
            is_load: true,
            ..Default::default()
        });
        g.edges.push(Edge {
            from: 0,
            to: 1,
            features: EdgeFeatures::default(),
        });

        let bytes = graph_to_bytes(&g);
        let decoded = graph_from_bytes(&bytes).unwrap();
        assert!(g.structurally_equals(&decoded));
        assert_eq!(decoded.source, "block0.s");
    }

    #[test]
    fn metrics_round_trips_with_empty_sample_lists() {
        let m = MetricsRecord::new("block0.s", 1000);
        let bytes = metrics_to_bytes(&m);
        let decoded = metrics_from_bytes(&bytes).unwrap();
        assert_eq!(decoded, m);
    }

    #[test]
    fn dataset_entry_round_trips() {
        let entry = DatasetEntry {
            id: "block0".into(),
            cov: 0.03,
            graph: Graph::new("block0.s"),
            metrics: MetricsRecord::new("block0.s", 500),
        };
        let bytes = dataset_entry_to_bytes(&entry);
        let decoded = dataset_entry_from_bytes(&bytes).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn dataset_list_round_trips_and_is_not_a_single_entry() {
        let entries = vec![
            DatasetEntry {
                id: "block0".into(),
                cov: 0.03,
                graph: Graph::new("block0.s"),
                metrics: MetricsRecord::new("block0.s", 500),
            },
            DatasetEntry {
                id: "block1".into(),
                cov: 0.1,
                graph: Graph::new("block1.s"),
                metrics: MetricsRecord::new("block1.s", 250),
            },
        ];

        let bytes = dataset_to_bytes(&entries);
        let decoded = dataset_from_bytes(&bytes).unwrap();
        assert_eq!(decoded, entries);
    }
}
