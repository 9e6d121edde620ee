use thiserror::Error;

/// Failure modes of harness generation: a block that fails to validate is
/// treated as un-benchmarkable rather than silently coerced.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("basic block contains a bare '$' that cannot be safely doubled for inline-asm quoting")]
    UnbalancedDollar,

    #[error("basic block line {0} is not valid inline-asm text: {1:?}")]
    InvalidLine(usize, String),
}
