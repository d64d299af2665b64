//! Error types for ac-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid channel count: {0}")]
    InvalidChannelCount(usize),

    #[error("Buffer of {len} bytes is not a whole number of {frame_bytes}-byte frames")]
    MisalignedBuffer { len: usize, frame_bytes: usize },
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
