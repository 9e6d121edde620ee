//! The data-flow [`Graph`] produced by the graph builder and consumed by
//! the codec and dataset assembler.
//!
//! Grounded on `lib/graph/Graph.cpp`'s `convertMCInstructionsToGraph`; the
//! actual traversal that fills a `Graph` lives in `llvm_ml_graph`, this
//! module only owns the data shape and equality.

use serde::{Deserialize, Serialize};

/// Per-node opcode and semantic classification.
///
/// Node ids are dense 0-based indices over [`Graph::nodes`]; `node_id` is
/// redundant with the node's position but is carried on the wire because
/// the original schema does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeFeatures {
    pub opcode: u32,
    pub node_id: u32,
    pub is_load: bool,
    pub is_store: bool,
    pub is_barrier: bool,
    pub is_atomic: bool,
    pub is_vector: bool,
    pub is_compute: bool,
    pub is_float: bool,
    pub is_virtual_root: bool,
}

impl Default for NodeFeatures {
    fn default() -> Self {
        Self {
            opcode: 0,
            node_id: 0,
            is_load: false,
            is_store: false,
            is_barrier: false,
            is_atomic: false,
            is_vector: false,
            is_compute: false,
            is_float: false,
            is_virtual_root: false,
        }
    }
}

/// Per-edge classification. All flags default false; a data-dependency
/// edge sets `is_data = true` and may additionally set the register-class
/// flags taken from the reading instruction's register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EdgeFeatures {
    pub is_data: bool,
    pub is_implicit: bool,
    pub is_vector: bool,
    pub is_tile: bool,
}

/// One directed edge, `from -> to`, carrying [`EdgeFeatures`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: u32,
    pub to: u32,
    pub features: EdgeFeatures,
}

/// A basic block's data-flow graph.
///
/// Invariants (enforced by the builder in `llvm_ml_graph`, assumed here):
/// if `has_virtual_root`, node 0 is the virtual root and every other node
/// has an incoming edge from it; every edge endpoint is a valid node id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub source: String,
    pub has_virtual_root: bool,
    pub max_opcodes: u32,
    pub nodes: Vec<NodeFeatures>,
    pub edges: Vec<Edge>,
}

impl Graph {
    /// An empty graph over `source`, with no virtual root and no opcode cap.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            has_virtual_root: false,
            max_opcodes: 0,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Append a node, returning its dense id.
    pub fn add_node(&mut self, features: NodeFeatures) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(features);
        id
    }

    /// Append an edge. Does not validate endpoints; the builder is
    /// responsible for only ever producing edges between known node ids.
    pub fn add_edge(&mut self, from: u32, to: u32, features: EdgeFeatures) {
        self.edges.push(Edge { from, to, features });
    }

    /// Structural equality used for deduplication: same node count,
    /// identical opcode sequence by `node_id`, identical `(from, to)` edge
    /// sequence. Edge feature flags are ignored.
    pub fn structurally_equals(&self, other: &Graph) -> bool {
        if self.nodes.len() != other.nodes.len() {
            return false;
        }
        let opcodes_match = self
            .nodes
            .iter()
            .zip(other.nodes.iter())
            .all(|(a, b)| a.node_id == b.node_id && a.opcode == b.opcode);
        if !opcodes_match {
            return false;
        }
        if self.edges.len() != other.edges.len() {
            return false;
        }
        self.edges
            .iter()
            .zip(other.edges.iter())
            .all(|(a, b)| a.from == b.from && a.to == b.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(opcode: u32, node_id: u32) -> NodeFeatures {
        NodeFeatures {
            opcode,
            node_id,
            ..Default::default()
        }
    }

    #[test]
    fn structural_equality_ignores_edge_feature_flags() {
        let mut a = Graph::new("a");
        a.add_node(node(1, 0));
        a.add_node(node(2, 1));
        a.add_edge(
            0,
            1,
            EdgeFeatures {
                is_data: true,
                is_vector: true,
                ..Default::default()
            },
        );

        let mut b = Graph::new("b");
        b.add_node(node(1, 0));
        b.add_node(node(2, 1));
        b.add_edge(0, 1, EdgeFeatures::default());

        assert!(a.structurally_equals(&b));
    }

    #[test]
    fn structural_equality_rejects_different_opcodes() {
        let mut a = Graph::new("a");
        a.add_node(node(1, 0));
        let mut b = Graph::new("b");
        b.add_node(node(2, 0));
        assert!(!a.structurally_equals(&b));
    }

    #[test]
    fn structural_equality_rejects_different_edges() {
        let mut a = Graph::new("a");
        a.add_node(node(1, 0));
        a.add_node(node(2, 1));
        a.add_edge(0, 1, EdgeFeatures::default());

        let mut b = Graph::new("b");
        b.add_node(node(1, 0));
        b.add_node(node(2, 1));

        assert!(!a.structurally_equals(&b));
    }
}
