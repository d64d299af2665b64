//! Filter and resampler property tests
//!
//! Verifies:
//! - Every designed section is stable across the supported parameter grid
//! - Low-pass designs settle to unity DC gain, high-pass to unity Nyquist gain
//! - Resampler output counts track the rate ratio
//! - Anti-aliasing rejects content above the output Nyquist rate

use ac_dsp::cheby1::{FilterSpec, cheby1, design};
use ac_dsp::{IirCascade, MonoProcessor, Resampler};
use approx::assert_relative_eq;

const POLE_COUNTS: [usize; 10] = [2, 4, 6, 8, 10, 12, 14, 16, 18, 20];
const RIPPLES: [u32; 4] = [0, 5, 15, 29];
const CUTOFFS: [f64; 5] = [0.05, 0.1, 0.3, 0.5, 0.9];
const SETTLE_SAMPLES: usize = 10_000;

/// Calculate RMS of signal
fn rms(signal: &[f64]) -> f64 {
    let sum: f64 = signal.iter().map(|x| x * x).sum();
    (sum / signal.len() as f64).sqrt()
}

fn generate_sine(samples: usize, freq: f64, sample_rate: f64, amplitude: f64) -> Vec<f64> {
    (0..samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            amplitude * (2.0 * std::f64::consts::PI * freq * t).sin()
        })
        .collect()
}

/// Jury criterion for a monic second-order denominator
fn section_is_stable(a1: f64, a2: f64) -> bool {
    a2.abs() < 1.0 && a1.abs() < 1.0 + a2
}

#[test]
fn test_lowpass_grid_stable_with_unity_dc() {
    for &poles in &POLE_COUNTS {
        for &ripple in &RIPPLES {
            for &cutoff in &CUTOFFS {
                let design = cheby1(poles, ripple, cutoff, false).unwrap();
                assert_eq!(design.sections().len(), poles / 2);

                for s in design.sections() {
                    assert!(
                        section_is_stable(s.a1, s.a2),
                        "unstable section: poles={poles} ripple={ripple} cutoff={cutoff}"
                    );
                }

                let mut filter = IirCascade::from_design(&design);
                let mut last = 0.0;
                for _ in 0..SETTLE_SAMPLES {
                    last = filter.process(1.0);
                }
                assert!(
                    (last - 1.0).abs() < 0.01,
                    "DC gain {last}: poles={poles} ripple={ripple} cutoff={cutoff}"
                );
            }
        }
    }
}

#[test]
fn test_highpass_grid_stable_with_unity_nyquist() {
    for &poles in &POLE_COUNTS {
        for &ripple in &RIPPLES {
            for &cutoff in &CUTOFFS[..4] {
                let design = cheby1(poles, ripple, cutoff, true).unwrap();

                for s in design.sections() {
                    assert!(section_is_stable(s.a1, s.a2));
                }

                let mut filter = IirCascade::from_design(&design);
                let mut last = 0.0;
                for i in 0..SETTLE_SAMPLES {
                    let x = if i % 2 == 0 { 1.0 } else { -1.0 };
                    last = filter.process(x);
                }
                assert!(
                    (last.abs() - 1.0).abs() < 0.01,
                    "Nyquist gain {last}: poles={poles} ripple={ripple} cutoff={cutoff}"
                );
            }
        }
    }
}

#[test]
fn test_folded_gain_matches_reference_point() {
    let lp = design(&FilterSpec::lowpass(8, 15, 0.25)).unwrap();
    assert_relative_eq!(lp.dc_gain(), 1.0, epsilon = 1e-9);

    let hp = design(&FilterSpec::highpass(8, 15, 0.25)).unwrap();
    assert_relative_eq!(hp.nyquist_gain(), 1.0, epsilon = 1e-9);
}

#[test]
fn test_block_and_sample_paths_agree() {
    let design = cheby1(6, 15, 0.3, false).unwrap();
    let mut block_filter = IirCascade::from_design(&design);
    let mut sample_filter = block_filter.clone();

    let mut block = generate_sine(512, 1000.0, 44100.0, 0.5);
    let expected: Vec<f64> = block.iter().map(|&x| sample_filter.process(x)).collect();
    block_filter.process_block(&mut block);

    assert_eq!(block, expected);
}

#[test]
fn test_downsample_count_bound() {
    for &(input_rate, output_rate) in &[(44100.0, 8000.0), (48000.0, 8000.0), (16000.0, 8000.0)] {
        let mut resampler = Resampler::new(input_rate, output_rate, 1000.0).unwrap();
        let mut out = Vec::new();
        let mut fed = 0usize;

        for block in [1usize, 7, 441, 4410, 12345] {
            for _ in 0..block {
                let produced = resampler.insert(0.0, &mut out);
                assert!(produced <= resampler.max_output());
            }
            fed += block;

            let expected = fed as f64 * output_rate / input_rate;
            assert!(
                (out.len() as f64 - expected).abs() <= 1.0,
                "{input_rate}->{output_rate}: {} outputs after {fed} inputs",
                out.len()
            );
        }
    }
}

#[test]
fn test_upsample_count_bound() {
    let mut resampler = Resampler::new(8000.0, 44100.0, 0.0).unwrap();
    let mut out = Vec::new();

    for _ in 0..8000 {
        let produced = resampler.insert(0.0, &mut out);
        assert!(produced <= resampler.max_output());
    }

    // Accumulated phase rounding allows a few samples of drift over a second
    assert_relative_eq!(out.len() as f64, 44100.0, max_relative = 1e-3);
}

#[test]
fn test_integer_ratio_phase_returns() {
    for &(input_rate, ratio) in &[(48000.0, 6usize), (16000.0, 2)] {
        let mut resampler = Resampler::new(input_rate, 8000.0, 1000.0).unwrap();
        let mut out = Vec::new();

        for k in 1..=100 {
            for _ in 0..ratio {
                resampler.insert(0.25, &mut out);
            }
            assert_eq!(resampler.phase(), 1.0);
            assert_eq!(out.len(), k);
        }
    }
}

#[test]
fn test_anti_alias_rejects_above_output_nyquist() {
    let input_rate = 44100.0;
    let resample = |freq: f64| {
        let mut resampler = Resampler::new(input_rate, 8000.0, 1000.0).unwrap();
        let input = generate_sine(22050, freq, input_rate, 0.5);
        let mut out = Vec::new();
        resampler.process_block(&input, &mut out);
        out
    };

    // Reference tone at a quarter of the output rate; skip the settling period
    let reference_rms = rms(&resample(2000.0)[800..]);

    for stop_freq in [4200.0, 6000.0] {
        let stop_rms = rms(&resample(stop_freq)[800..]);
        let rejection_db = 20.0 * (reference_rms / stop_rms).log10();
        assert!(
            rejection_db >= 30.0,
            "{stop_freq} Hz rejected by only {rejection_db:.1} dB"
        );
    }

    // A passband tone keeps its level within the ripple band
    let pass_rms = rms(&resample(1500.0)[800..]);
    assert_relative_eq!(pass_rms, 0.5 / 2f64.sqrt(), max_relative = 0.2);
}
