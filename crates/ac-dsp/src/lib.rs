//! ac-dsp: Filter design, IIR execution and sample-rate conversion
//!
//! ## Modules
//! - `cheby1` - Chebyshev Type I (and Butterworth, at zero ripple) coefficient design
//! - `iir` - Direct-Form-II cascade of biquad sections
//! - `resampler` - anti-aliased linear-interpolation rate converter

pub mod cheby1;
pub mod iir;
pub mod resampler;

mod error;

pub use cheby1::{BiquadCoeffs, FilterDesign, FilterSpec};
pub use error::*;
pub use iir::IirCascade;
pub use resampler::Resampler;

use ac_core::Sample;

/// Sample-by-sample mono processor
pub trait MonoProcessor: Send + Sync {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;

    /// Process a block of samples in place
    fn process_block(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}
