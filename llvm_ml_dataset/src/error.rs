use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("I/O error reading {0}: {1}")]
    Io(std::path::PathBuf, std::io::Error),

    #[error("codec error decoding {0}: {1}")]
    Codec(std::path::PathBuf, llvm_ml_codec::CodecError),
}
