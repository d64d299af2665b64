//! DSP error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Percent ripple {0} not within range 0 <= ripple < 30")]
    InvalidRipple(u32),

    #[error("Pole count {0} must be even and >= 2")]
    InvalidPoleCount(usize),

    #[error("Cutoff {0} must be within (0, 1] of the Nyquist rate and leave a usable gain")]
    InvalidCutoff(f64),

    #[error("Sample rate {0} Hz is below the 10 Hz minimum")]
    RateTooLow(f64),
}

pub type DspResult<T> = Result<T, DspError>;
