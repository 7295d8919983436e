use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FuzzError {
    #[error("failed to read wordlist {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid base request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("body offset {body_offset} exceeds response length {len}")]
    MalformedResponse { body_offset: usize, len: usize },
}
