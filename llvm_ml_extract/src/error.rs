use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to parse object file: {0}")]
    Object(#[from] object::read::Error),

    #[error("decode failed: {0}")]
    Decode(#[from] llvm_ml_target::TargetError),

    #[error("graph construction failed: {0}")]
    Graph(#[from] llvm_ml_graph::GraphError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
