//! Shared data model for the llvm-ml cycle benchmarking toolkit.
//!
//! This crate holds the types every other crate in the workspace agrees on:
//! the read-only [`Instruction`] view, the [`MLTarget`] capability trait,
//! the dependency [`Graph`], the per-trial [`BenchmarkResult`] and aggregated
//! [`Measurement`], and the [`consts`] every measurement stage is derived
//! from. Nothing in this crate touches the filesystem or a process.

pub mod consts;
pub mod dataset;
pub mod graph;
pub mod instruction;
pub mod metrics;
pub mod result;
pub mod stat;
pub mod target;

pub use dataset::DatasetEntry;
pub use graph::{EdgeFeatures, Graph, NodeFeatures};
pub use instruction::{Instruction, MemOperand, Operand, RegId};
pub use metrics::MetricsRecord;
pub use result::{measure, BenchmarkResult, Measurement};
pub use target::MLTarget;
