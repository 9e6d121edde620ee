use thiserror::Error;

/// Failures from assembly parsing or machine-code decoding.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("unknown mnemonic {0:?} on line {1}")]
    UnknownMnemonic(String, usize),

    #[error("malformed operand {0:?} on line {1}")]
    MalformedOperand(String, usize),

    #[error("unknown register {0:?} on line {1}")]
    UnknownRegister(String, usize),

    #[error("decode failed at offset {0:#x}: {1}")]
    DecodeFailed(u64, String),
}
