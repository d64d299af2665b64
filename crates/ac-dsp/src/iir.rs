//! Cascaded biquad executor using Direct Form II
//!
//! Each section keeps two delay registers shared between its feedback and
//! feedforward paths. Sections run in order; the output of one is the input
//! of the next.

use ac_core::Sample;

use crate::cheby1::{BiquadCoeffs, FilterDesign};
use crate::MonoProcessor;

/// Delay registers of one section
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SectionState {
    w1: f64,
    w2: f64,
}

/// Direct Form II biquad cascade
#[derive(Debug, Clone)]
pub struct IirCascade {
    coeffs: Vec<BiquadCoeffs>,
    state: Vec<SectionState>,
}

impl IirCascade {
    /// Build a cascade from sections whose `a0` is 1
    pub fn new(sections: &[BiquadCoeffs]) -> Self {
        debug_assert!(sections.iter().all(|s| s.a0 == 1.0));

        Self {
            coeffs: sections.to_vec(),
            state: vec![SectionState::default(); sections.len()],
        }
    }

    pub fn from_design(design: &FilterDesign) -> Self {
        Self::new(design.sections())
    }

    #[inline]
    pub fn section_count(&self) -> usize {
        self.coeffs.len()
    }

    #[inline]
    pub fn coeffs(&self) -> &[BiquadCoeffs] {
        &self.coeffs
    }

    /// Filter one sample through every section
    #[inline]
    pub fn process(&mut self, input: Sample) -> Sample {
        let mut x = input;
        for (c, s) in self.coeffs.iter().zip(self.state.iter_mut()) {
            let w0 = x - c.a1 * s.w1 - c.a2 * s.w2;
            let y = c.b0 * w0 + c.b1 * s.w1 + c.b2 * s.w2;
            s.w2 = s.w1;
            s.w1 = w0;
            x = y;
        }
        x
    }
}

impl MonoProcessor for IirCascade {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        self.process(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cheby1::cheby1;

    #[test]
    fn test_bypass() {
        let mut filter = IirCascade::new(&[BiquadCoeffs::bypass()]);

        let input = 0.5;
        let output = filter.process(input);
        assert!((output - input).abs() < 1e-10);
    }

    #[test]
    fn test_empty_cascade_is_identity() {
        let mut filter = IirCascade::new(&[]);
        assert_eq!(filter.process(0.25), 0.25);
    }

    #[test]
    fn test_lowpass_dc() {
        let design = cheby1(4, 0, 0.1, false).unwrap();
        let mut filter = IirCascade::from_design(&design);

        // DC signal should pass through lowpass
        for _ in 0..2000 {
            filter.process(1.0);
        }
        let output = filter.process(1.0);
        assert!((output - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_highpass_dc() {
        let design = cheby1(4, 5, 0.2, true).unwrap();
        let mut filter = IirCascade::from_design(&design);

        // DC signal should be blocked by highpass
        for _ in 0..2000 {
            filter.process(1.0);
        }
        let output = filter.process(1.0);
        assert!(output.abs() < 0.01);
    }

    #[test]
    fn test_state_persists_between_calls() {
        let design = cheby1(2, 0, 0.5, false).unwrap();
        let mut filter = IirCascade::from_design(&design);

        // Impulse response of the half-band Butterworth section
        let first = filter.process(1.0);
        let second = filter.process(0.0);
        let s = design.sections()[0];

        assert!((first - s.b0).abs() < 1e-12);
        assert!((second - (s.b1 - s.a1 * s.b0)).abs() < 1e-12);
        assert_ne!(filter.state[0], SectionState::default());
    }

    #[test]
    fn test_process_block_matches_per_sample() {
        let design = cheby1(6, 15, 0.3, false).unwrap();
        let mut a = IirCascade::from_design(&design);
        let mut b = a.clone();

        let mut block: Vec<Sample> = (0..64).map(|i| ((i * 7) % 11) as f64 / 11.0).collect();
        let expected: Vec<Sample> = block.iter().map(|&x| a.process(x)).collect();
        b.process_block(&mut block);

        assert_eq!(block, expected);
    }
}
