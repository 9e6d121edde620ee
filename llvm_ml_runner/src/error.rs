use thiserror::Error;

/// Failure modes of the Sandboxed Runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to compile harness module: {0}")]
    Compile(String),

    #[error("failed to link shared object: {0}")]
    Link(String),

    #[error("failed to load compiled harness: {0}")]
    Load(#[from] libloading::Error),

    #[error("harness is missing the `{0}` symbol")]
    MissingSymbol(&'static str),

    #[error("shared memory setup failed: {0}")]
    SharedMemory(std::io::Error),

    #[error("fork failed: {0}")]
    Fork(nix::Error),

    #[error("ptrace attach failed: {0}")]
    Attach(nix::Error),

    #[error("ptrace operation failed: {0}")]
    Ptrace(nix::Error),

    #[error("same instruction pointer faulted twice at {0:#x}")]
    RepeatedFault(u64),

    #[error("page fault at null address")]
    NullFault,

    #[error("exceeded MAX_FAULTS ({0}) page-fault iterations")]
    TooManyFaults(u32),

    #[error("child exited with unknown/unexpected status: {0}")]
    UnknownExit(String),

    #[error("workload is too short to measure reliably ({0} ns/iter)")]
    TooFastToCalibrate(f64),

    #[error("no successful trials to calibrate from")]
    NoSuccessfulTrials,
}
