//! Sample types and 16-bit PCM conversion

/// Type alias for audio samples (always f64 inside the DSP path)
pub type Sample = f64;

/// Full-scale magnitude of signed 16-bit PCM
pub const PCM16_SCALE: Sample = 32768.0;

/// Convert a normalized sample to signed 16-bit PCM.
///
/// Out-of-range input saturates at the i16 limits.
#[inline]
pub fn to_pcm16(sample: Sample) -> i16 {
    (sample * PCM16_SCALE).clamp(i16::MIN as Sample, i16::MAX as Sample) as i16
}

/// Convert signed 16-bit PCM to a normalized sample
#[inline]
pub fn from_pcm16(value: i16) -> Sample {
    value as Sample / PCM16_SCALE
}

/// Average all channels of one frame into a single mono sample
#[inline]
pub fn downmix(frame: &[Sample]) -> Sample {
    match frame.len() {
        0 => 0.0,
        1 => frame[0],
        2 => (frame[0] + frame[1]) / 2.0,
        n => frame.iter().sum::<Sample>() / n as Sample,
    }
}
