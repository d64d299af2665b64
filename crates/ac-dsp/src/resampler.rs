//! Sample-rate converter
//!
//! Anti-alias filtering (downsampling only) followed by linear interpolation
//! driven by a fractional phase accumulator. The accumulator holds the
//! position of the next output relative to the previous input sample, in
//! input-sample units; every input shifts the window by one sample.

use ac_core::Sample;

use crate::cheby1::{FilterSpec, design};
use crate::iir::IirCascade;
use crate::{DspError, DspResult};

/// Rates below this make the anti-alias design unstable
pub const MIN_RATE_HZ: f64 = 10.0;

/// Fixed anti-alias design: 6 poles, 15% ripple
pub const ANTI_ALIAS_POLES: usize = 6;
pub const ANTI_ALIAS_RIPPLE_PERCENT: u32 = 15;

/// Linear-interpolation resampler with Chebyshev anti-aliasing
#[derive(Debug, Clone)]
pub struct Resampler {
    input_rate: f64,
    output_rate: f64,
    /// Fs_in / Fs_out
    rate_ratio: f64,
    phase: f64,
    prev: Sample,
    curr: Sample,
    filter: Option<IirCascade>,
}

impl Resampler {
    /// Create a converter from `input_rate` to `output_rate`.
    ///
    /// When downsampling, the anti-alias cutoff sits `padding_hz` below the
    /// output Nyquist frequency.
    pub fn new(input_rate: f64, output_rate: f64, padding_hz: f64) -> DspResult<Self> {
        if !(input_rate >= MIN_RATE_HZ) {
            return Err(DspError::RateTooLow(input_rate));
        }
        if !(output_rate >= MIN_RATE_HZ) {
            return Err(DspError::RateTooLow(output_rate));
        }

        let filter = if output_rate < input_rate {
            let cutoff = (output_rate / 2.0 - padding_hz) / (input_rate / 2.0);
            let spec = FilterSpec::lowpass(ANTI_ALIAS_POLES, ANTI_ALIAS_RIPPLE_PERCENT, cutoff);
            Some(IirCascade::from_design(&design(&spec)?))
        } else {
            None
        };

        log::debug!(
            "Resampler {:.0}Hz -> {:.0}Hz (ratio {:.6}, anti-alias: {})",
            input_rate,
            output_rate,
            input_rate / output_rate,
            filter.is_some()
        );

        Ok(Self {
            input_rate,
            output_rate,
            rate_ratio: input_rate / output_rate,
            // Starting one full step ahead puts the first output on the first input
            phase: 1.0,
            prev: 0.0,
            curr: 0.0,
            filter,
        })
    }

    #[inline]
    pub fn input_rate(&self) -> f64 {
        self.input_rate
    }

    #[inline]
    pub fn output_rate(&self) -> f64 {
        self.output_rate
    }

    #[inline]
    pub fn rate_ratio(&self) -> f64 {
        self.rate_ratio
    }

    #[inline]
    pub fn phase(&self) -> f64 {
        self.phase
    }

    #[inline]
    pub fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }

    /// Upper bound on the outputs a single [`insert`](Self::insert) produces
    pub fn max_output(&self) -> usize {
        ((1.0 / self.rate_ratio).ceil() as usize).max(1)
    }

    /// Feed one input sample, appending 0..=`max_output()` samples to `output`.
    ///
    /// Returns the number of samples appended.
    pub fn insert(&mut self, input: Sample, output: &mut Vec<Sample>) -> usize {
        let filtered = match self.filter.as_mut() {
            Some(filter) => filter.process(input),
            None => input,
        };

        self.prev = self.curr;
        self.curr = filtered;

        let mut produced = 0;
        while self.phase <= 1.0 {
            output.push(self.prev + (self.curr - self.prev) * self.phase);
            self.phase += self.rate_ratio;
            produced += 1;
        }
        self.phase -= 1.0;

        produced
    }

    /// Feed a block of input samples
    pub fn process_block(&mut self, input: &[Sample], output: &mut Vec<Sample>) -> usize {
        input
            .iter()
            .map(|&sample| self.insert(sample, output))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_too_low() {
        assert_eq!(
            Resampler::new(5.0, 8000.0, 0.0).unwrap_err(),
            DspError::RateTooLow(5.0)
        );
        assert_eq!(
            Resampler::new(44100.0, 9.5, 0.0).unwrap_err(),
            DspError::RateTooLow(9.5)
        );
        assert!(Resampler::new(f64::NAN, 8000.0, 0.0).is_err());
    }

    #[test]
    fn test_filter_only_when_downsampling() {
        assert!(Resampler::new(44100.0, 8000.0, 1000.0).unwrap().is_filtered());
        assert!(!Resampler::new(8000.0, 44100.0, 1000.0).unwrap().is_filtered());
        assert!(!Resampler::new(8000.0, 8000.0, 1000.0).unwrap().is_filtered());
    }

    #[test]
    fn test_padding_beyond_nyquist_rejected() {
        let err = Resampler::new(44100.0, 8000.0, 4000.0).unwrap_err();
        assert!(matches!(err, DspError::InvalidCutoff(_)));
    }

    #[test]
    fn test_max_output() {
        assert_eq!(Resampler::new(44100.0, 8000.0, 1000.0).unwrap().max_output(), 1);
        assert_eq!(Resampler::new(8000.0, 8000.0, 0.0).unwrap().max_output(), 1);
        assert_eq!(Resampler::new(8000.0, 16000.0, 0.0).unwrap().max_output(), 2);
        assert_eq!(Resampler::new(8000.0, 44100.0, 0.0).unwrap().max_output(), 6);
        assert_eq!(Resampler::new(10000.0, 53000.0, 0.0).unwrap().max_output(), 6);
    }

    #[test]
    fn test_identity_rate_passes_samples() {
        let mut resampler = Resampler::new(8000.0, 8000.0, 0.0).unwrap();
        let mut out = Vec::new();
        resampler.process_block(&[0.25, 0.5, -0.75, 1.0], &mut out);
        assert_eq!(out, vec![0.25, 0.5, -0.75, 1.0]);
    }

    #[test]
    fn test_upsample_interpolates() {
        let mut resampler = Resampler::new(8000.0, 16000.0, 0.0).unwrap();
        let mut out = Vec::new();

        assert_eq!(resampler.insert(1.0, &mut out), 1);
        assert_eq!(resampler.insert(2.0, &mut out), 2);
        assert_eq!(resampler.insert(3.0, &mut out), 2);
        assert_eq!(out, vec![1.0, 1.5, 2.0, 2.5, 3.0]);
    }

    #[test]
    fn test_downsample_count_and_phase() {
        // Ratio 6 is exact in binary, so the phase returns to 1.0 exactly
        let mut resampler = Resampler::new(48000.0, 8000.0, 1000.0).unwrap();
        let mut out = Vec::new();

        for k in 1..=10 {
            for _ in 0..6 {
                resampler.insert(0.0, &mut out);
            }
            assert_eq!(out.len(), k);
            assert_eq!(resampler.phase(), 1.0);
        }
    }
}
