//! Graph Builder: turns a decoded basic block into a data-flow graph.

pub mod builder;
pub mod error;

pub use builder::{build_graph, BuildOptions};
pub use error::GraphError;
