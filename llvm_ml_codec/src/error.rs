use thiserror::Error;

/// Failure modes of the packed binary codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unexpected end of buffer while reading a {0}")]
    UnexpectedEof(&'static str),

    #[error("reader exceeded its word budget ({0} words)")]
    WordBudgetExceeded(u64),

    #[error("reader exceeded its nesting depth bound ({0})")]
    DepthExceeded(u32),

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown record tag {0}")]
    UnknownTag(u8),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
