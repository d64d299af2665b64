//! Chebyshev Type I filter design
//!
//! Recursive low-pass/high-pass design after the pole-pair method: each
//! complex-conjugate pole pair of the analog prototype is placed on the unit
//! circle (Butterworth), optionally warped onto the Chebyshev ellipse, mapped
//! to the z-plane with the bilinear transform and frequency-shifted to the
//! requested cutoff. Every pole pair becomes one biquad section.
//!
//! The prototype math uses the recursion convention
//! `y[n] = x0·x[n] + x1·x[n-1] + x2·x[n-2] + y1·y[n-1] + y2·y[n-2]`;
//! results are returned in the usual transfer-function convention
//! `H(z) = (b0 + b1·z⁻¹ + b2·z⁻²) / (1 + a1·z⁻¹ + a2·z⁻²)`.

use std::f64::consts::PI;

use crate::{DspError, DspResult};

/// Ripple at or above this percentage is outside the supported domain
pub const MAX_RIPPLE_PERCENT: u32 = 30;

/// Filter design request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    /// Even number of poles, 2 or greater
    pub pole_count: usize,
    /// Passband ripple in percent; 0 gives a Butterworth response
    pub ripple_percent: u32,
    /// Cutoff normalized to the Nyquist rate (1.0 = Nyquist)
    pub cutoff: f64,
    /// High-pass instead of low-pass
    pub highpass: bool,
}

impl FilterSpec {
    pub fn lowpass(pole_count: usize, ripple_percent: u32, cutoff: f64) -> Self {
        Self {
            pole_count,
            ripple_percent,
            cutoff,
            highpass: false,
        }
    }

    pub fn highpass(pole_count: usize, ripple_percent: u32, cutoff: f64) -> Self {
        Self {
            pole_count,
            ripple_percent,
            cutoff,
            highpass: true,
        }
    }

    pub fn validate(&self) -> DspResult<()> {
        if self.ripple_percent >= MAX_RIPPLE_PERCENT {
            return Err(DspError::InvalidRipple(self.ripple_percent));
        }
        if self.pole_count < 2 || self.pole_count % 2 != 0 {
            return Err(DspError::InvalidPoleCount(self.pole_count));
        }
        if !(self.cutoff > 0.0 && self.cutoff <= 1.0) {
            return Err(DspError::InvalidCutoff(self.cutoff));
        }
        Ok(())
    }
}

/// Second-order section coefficients, `a0 == 1`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Unity gain, no filtering
    pub fn bypass() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a0: 1.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    #[inline]
    pub fn numerator(&self) -> [f64; 3] {
        [self.b0, self.b1, self.b2]
    }

    #[inline]
    pub fn denominator(&self) -> [f64; 3] {
        [self.a0, self.a1, self.a2]
    }

    fn is_finite(&self) -> bool {
        self.numerator()
            .iter()
            .chain(self.denominator().iter())
            .all(|c| c.is_finite())
    }
}

/// Result of a filter design: per-section coefficients plus the folded
/// transfer polynomial of the whole cascade
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDesign {
    spec: FilterSpec,
    sections: Vec<BiquadCoeffs>,
    numerator: Vec<f64>,
    denominator: Vec<f64>,
}

impl FilterDesign {
    #[inline]
    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    /// Biquad sections in cascade order
    #[inline]
    pub fn sections(&self) -> &[BiquadCoeffs] {
        &self.sections
    }

    /// Folded numerator `b0 + b1·z⁻¹ + …`
    #[inline]
    pub fn numerator(&self) -> &[f64] {
        &self.numerator
    }

    /// Folded denominator `1 + a1·z⁻¹ + …`
    #[inline]
    pub fn denominator(&self) -> &[f64] {
        &self.denominator
    }

    /// Number of coefficients per polynomial (pole count + 1)
    #[inline]
    pub fn count(&self) -> usize {
        self.numerator.len()
    }

    /// Magnitude of the folded response at DC
    pub fn dc_gain(&self) -> f64 {
        evaluate(&self.numerator, 1.0) / evaluate(&self.denominator, 1.0)
    }

    /// Magnitude of the folded response at Nyquist
    pub fn nyquist_gain(&self) -> f64 {
        evaluate(&self.numerator, -1.0) / evaluate(&self.denominator, -1.0)
    }
}

/// Prototype section for one pole pair, recursion convention
#[derive(Debug, Clone, Copy)]
struct PrototypeSection {
    x: [f64; 3],
    y: [f64; 2],
}

impl PrototypeSection {
    /// Numerator/denominator in transfer-function convention
    fn transfer(&self) -> ([f64; 3], [f64; 3]) {
        (self.x, [1.0, -self.y[0], -self.y[1]])
    }
}

/// Design a Chebyshev Type I filter.
///
/// `cutoff` is normalized to the Nyquist rate. A ripple of 0 yields a
/// Butterworth response.
pub fn cheby1(
    pole_count: usize,
    ripple_percent: u32,
    cutoff: f64,
    highpass: bool,
) -> DspResult<FilterDesign> {
    design(&FilterSpec {
        pole_count,
        ripple_percent,
        cutoff,
        highpass,
    })
}

/// Design the filter described by `spec`
pub fn design(spec: &FilterSpec) -> DspResult<FilterDesign> {
    spec.validate()?;

    // The pole-pair equations take the cutoff as a fraction of the sample rate
    let fc = spec.cutoff / 2.0;
    let pairs = spec.pole_count / 2;

    let mut numerator = vec![1.0];
    let mut denominator = vec![1.0];
    let mut sections = Vec::with_capacity(pairs);

    for pole in 0..pairs {
        let proto = pole_pair(pole, spec, fc);
        let (x, y) = proto.transfer();

        numerator = convolve(&numerator, &x);
        denominator = convolve(&denominator, &y);

        let gain = reference_gain(&x, &y, spec.highpass);
        let section = BiquadCoeffs {
            b0: x[0] / gain,
            b1: x[1] / gain,
            b2: x[2] / gain,
            a0: 1.0,
            a1: y[1],
            a2: y[2],
        };
        if !gain.is_finite() || gain == 0.0 || !section.is_finite() {
            return Err(DspError::InvalidCutoff(spec.cutoff));
        }
        sections.push(section);
    }

    let gain = reference_gain(&numerator, &denominator, spec.highpass);
    if !gain.is_finite() || gain == 0.0 {
        return Err(DspError::InvalidCutoff(spec.cutoff));
    }
    for b in numerator.iter_mut() {
        *b /= gain;
    }

    log::debug!(
        "cheby1: {} poles, {}% ripple, fc={:.6}, {} -> {} sections",
        spec.pole_count,
        spec.ripple_percent,
        spec.cutoff,
        if spec.highpass { "highpass" } else { "lowpass" },
        sections.len()
    );

    Ok(FilterDesign {
        spec: *spec,
        sections,
        numerator,
        denominator,
    })
}

/// Coefficients of one pole pair, `fc` as a fraction of the sample rate
fn pole_pair(pole: usize, spec: &FilterSpec, fc: f64) -> PrototypeSection {
    let np = spec.pole_count as f64;
    let angle = PI / (2.0 * np) + pole as f64 * PI / np;

    // Pole on the unit circle
    let mut rp = -angle.cos();
    let mut ip = angle.sin();

    // Warp the circle onto the Chebyshev ellipse
    if spec.ripple_percent > 0 {
        let ripple = spec.ripple_percent as f64;
        let es = ((100.0 / (100.0 - ripple)).powi(2) - 1.0).sqrt();
        let vx = (1.0 / es).asinh() / np;
        let kx = ((1.0 / es).acosh() / np).cosh();
        rp *= vx.sinh() / kx;
        ip *= vx.cosh() / kx;
    }

    // s-domain to z-domain
    let t = 2.0 * 0.5f64.tan();
    let w = 2.0 * PI * fc;
    let m = rp * rp + ip * ip;
    let d = 4.0 - 4.0 * rp * t + m * t * t;

    let x0 = t * t / d;
    let x1 = 2.0 * x0;
    let x2 = x0;
    let y1 = (8.0 - 2.0 * m * t * t) / d;
    let y2 = (-4.0 - 4.0 * rp * t - m * t * t) / d;

    // Low-pass prototype at 1 rad/s to low-pass or high-pass at `w`
    let k = if spec.highpass {
        -(w / 2.0 + 0.5).cos() / (w / 2.0 - 0.5).cos()
    } else {
        (0.5 - w / 2.0).sin() / (0.5 + w / 2.0).sin()
    };
    let k2 = k * k;
    let d = 1.0 + y1 * k - y2 * k2;

    let mut a = [
        (x0 - x1 * k + x2 * k2) / d,
        (-2.0 * x0 * k + x1 + x1 * k2 - 2.0 * x2 * k) / d,
        (x0 * k2 - x1 * k + x2) / d,
    ];
    let mut b = [
        (2.0 * k + y1 + y1 * k2 - 2.0 * y2 * k) / d,
        (-k2 - y1 * k + y2) / d,
    ];

    if spec.highpass {
        a[1] = -a[1];
        b[0] = -b[0];
    }

    PrototypeSection { x: a, y: b }
}

/// Gain at DC (low-pass) or Nyquist (high-pass) of `num / den`
fn reference_gain(num: &[f64], den: &[f64], highpass: bool) -> f64 {
    let z = if highpass { -1.0 } else { 1.0 };
    evaluate(num, z) / evaluate(den, z)
}

/// Evaluate `c0 + c1·z⁻¹ + c2·z⁻² + …` at real `z = ±1`
fn evaluate(coeffs: &[f64], z: f64) -> f64 {
    let mut sign = 1.0;
    let mut sum = 0.0;
    for &c in coeffs {
        sum += c * sign;
        sign *= z;
    }
    sum
}

/// Polynomial product
fn convolve(lhs: &[f64], rhs: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; lhs.len() + rhs.len() - 1];
    for (i, &l) in lhs.iter().enumerate() {
        for (j, &r) in rhs.iter().enumerate() {
            out[i + j] += l * r;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_invalid_specs() {
        assert_eq!(cheby1(4, 30, 0.5, false), Err(DspError::InvalidRipple(30)));
        assert_eq!(cheby1(3, 0, 0.5, false), Err(DspError::InvalidPoleCount(3)));
        assert_eq!(cheby1(0, 0, 0.5, false), Err(DspError::InvalidPoleCount(0)));
        assert_eq!(cheby1(4, 0, 0.0, false), Err(DspError::InvalidCutoff(0.0)));
        assert_eq!(cheby1(4, 0, 1.5, false), Err(DspError::InvalidCutoff(1.5)));
        assert!(matches!(
            cheby1(4, 0, f64::NAN, false),
            Err(DspError::InvalidCutoff(_))
        ));
    }

    #[test]
    fn test_pole_pair_matches_reference_lowpass() {
        // 4 poles, Butterworth, cutoff 0.1 of the sample rate, first pair
        let spec = FilterSpec::lowpass(4, 0, 0.2);
        let proto = pole_pair(0, &spec, 0.1);

        assert_relative_eq!(proto.x[0], 0.061885, epsilon = 1e-6);
        assert_relative_eq!(proto.x[1], 0.123770, epsilon = 1e-6);
        assert_relative_eq!(proto.x[2], 0.061885, epsilon = 1e-6);
        assert_relative_eq!(proto.y[0], 1.048600, epsilon = 1e-6);
        assert_relative_eq!(proto.y[1], -0.296140, epsilon = 1e-6);
    }

    #[test]
    fn test_pole_pair_matches_reference_highpass() {
        // 4 poles, 10% ripple, high-pass, second pair
        let spec = FilterSpec::highpass(4, 10, 0.2);
        let proto = pole_pair(1, &spec, 0.1);

        assert_relative_eq!(proto.x[0], 0.922920, epsilon = 1e-6);
        assert_relative_eq!(proto.x[1], -1.845840, epsilon = 1e-6);
        assert_relative_eq!(proto.x[2], 0.922920, epsilon = 1e-6);
        assert_relative_eq!(proto.y[0], 1.446913, epsilon = 1e-6);
        assert_relative_eq!(proto.y[1], -0.836654, epsilon = 1e-6);
    }

    #[test]
    fn test_second_order_butterworth_half_band() {
        let design = cheby1(2, 0, 0.5, false).unwrap();
        let s = design.sections()[0];

        assert_eq!(design.sections().len(), 1);
        assert_relative_eq!(s.b0, 0.292893, epsilon = 1e-6);
        assert_relative_eq!(s.b1, 0.585786, epsilon = 1e-6);
        assert_relative_eq!(s.b2, 0.292893, epsilon = 1e-6);
        assert_eq!(s.a0, 1.0);
        assert!(s.a1.abs() < 1e-12);
        assert_relative_eq!(s.a2, 0.171573, epsilon = 1e-6);
    }

    #[test]
    fn test_folded_highpass_polynomial() {
        let design = cheby1(4, 15, 0.5, true).unwrap();

        assert_eq!(design.count(), 5);
        let expected_b = [0.053911, -0.215645, 0.323467, -0.215645, 0.053911];
        let expected_a = [1.0, 0.954707, 1.232436, 0.701060, 0.285910];
        for (got, want) in design.numerator().iter().zip(expected_b) {
            assert_relative_eq!(*got, want, epsilon = 1e-6);
        }
        for (got, want) in design.denominator().iter().zip(expected_a) {
            assert_relative_eq!(*got, want, epsilon = 1e-6);
        }
        assert_relative_eq!(design.nyquist_gain(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sections_multiply_to_folded_polynomial() {
        let design = cheby1(6, 15, 3000.0 / 22050.0, false).unwrap();

        let mut num = vec![1.0];
        let mut den = vec![1.0];
        for s in design.sections() {
            num = convolve(&num, &s.numerator());
            den = convolve(&den, &s.denominator());
        }

        for (a, b) in num.iter().zip(design.numerator()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12, max_relative = 1e-9);
        }
        for (a, b) in den.iter().zip(design.denominator()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12, max_relative = 1e-9);
        }
        assert_relative_eq!(design.dc_gain(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_highpass_at_nyquist_rejected() {
        // In range, but a high-pass at Nyquist has no gain to normalize by
        assert_eq!(cheby1(4, 0, 1.0, true), Err(DspError::InvalidCutoff(1.0)));
    }
}
