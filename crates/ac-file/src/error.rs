//! File I/O error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("Unsupported WAV spec: {0}")]
    UnsupportedSpec(String),
}

pub type FileResult<T> = Result<T, FileError>;
