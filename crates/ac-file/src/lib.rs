//! ac-file: Output stream I/O
//!
//! Provides:
//! - WAV header for open-ended PCM streams (via hound's `WavSpec`)
//! - Output sink writing to a file or standard output

mod error;
mod sink;
mod wav;

pub use error::*;
pub use sink::*;
pub use wav::*;
