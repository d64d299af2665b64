//! ac-core: Shared types for the capture workspace
//!
//! Sample representation, raw PCM formats as delivered by capture backends,
//! and a bounds-checked view over interleaved frames.

mod error;
mod pcm;
mod sample;

pub use error::*;
pub use pcm::*;
pub use sample::*;

/// Rate of the interleaved output stream
pub const OUTPUT_SAMPLE_RATE: u32 = 8000;

/// Bytes per output sample (signed 16-bit)
pub const OUTPUT_BYTES_PER_SAMPLE: usize = 2;
