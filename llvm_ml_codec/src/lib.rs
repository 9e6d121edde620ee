//! Graph/Metrics Codec: packed binary encoding with a bounded word budget
//! and nesting depth, plus a JSON emitter for debugging.

pub mod error;
pub mod json;
pub mod record;
pub mod wire;

pub use error::CodecError;
pub use json::to_json_pretty;
pub use record::{
    dataset_entry_from_bytes, dataset_entry_to_bytes, dataset_from_bytes, dataset_to_bytes,
    graph_from_bytes, graph_to_bytes, metrics_from_bytes, metrics_to_bytes,
};
pub use wire::{Reader, Writer};
