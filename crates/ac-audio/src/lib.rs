//! ac-audio: Multi-channel capture using cpal
//!
//! Captures one or more input devices, resamples each to the output rate on
//! its own thread and interleaves the results into one 16-bit stream.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────┐   ┌────────────┐   ┌──────────────┐   ┌──────┐
//! │ cpal stream │──▶│ RingBuf  │──▶│ DrainLoop  │──▶│ SharedQueues │──▶│ Mux  │──▶ sink
//! │ (callback)  │   │ (bytes)  │   │ (resample) │   │ (one mutex)  │   │      │
//! └─────────────┘   └──────────┘   └────────────┘   └──────────────┘   └──────┘
//!        one per channel ─────────────────────────▶        shared
//! ```

mod channel;
mod device;
mod error;
mod mux;
mod ringbuf;
mod session;
mod shutdown;
mod stream;

pub use channel::*;
pub use device::*;
pub use error::*;
pub use mux::*;
pub use ringbuf::*;
pub use session::*;
pub use shutdown::*;
pub use stream::*;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ac_core::{OUTPUT_SAMPLE_RATE, PcmFormat};
use ac_dsp::resampler::MIN_RATE_HZ;

/// Capture session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Device ids, one per output channel; empty selects the default input
    pub devices: Vec<String>,
    pub output_rate: u32,
    /// Distance of the anti-alias cutoff below the output Nyquist rate
    pub padding_hz: f64,
    /// Ring buffer length per channel
    pub ring_seconds: u32,
    pub poll_interval_ms: u64,
    /// Upper bound on frames interleaved per multiplex cycle
    pub max_slice: usize,
    /// Sample formats in order of preference
    pub formats: Vec<PcmFormat>,
    /// Capture rates in order of preference
    pub sample_rates: Vec<u32>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            output_rate: OUTPUT_SAMPLE_RATE,
            padding_hz: 1000.0,
            ring_seconds: 30,
            poll_interval_ms: 250,
            max_slice: 10240,
            formats: vec![
                PcmFormat::F32,
                PcmFormat::I32,
                PcmFormat::I16,
                PcmFormat::F64,
                PcmFormat::U32,
                PcmFormat::U16,
                PcmFormat::I8,
                PcmFormat::U8,
            ],
            sample_rates: vec![48000, 44100, 96000, 24000],
        }
    }
}

impl CaptureConfig {
    /// Load a config file; missing keys keep their defaults
    pub fn from_json_file(path: &Path) -> AudioResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AudioError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AudioResult<()> {
        if (self.output_rate as f64) < MIN_RATE_HZ {
            return Err(AudioError::Config(format!(
                "output rate {} Hz is below {} Hz",
                self.output_rate, MIN_RATE_HZ
            )));
        }
        if !(self.padding_hz >= 0.0) {
            return Err(AudioError::Config(format!(
                "padding {} Hz must be non-negative",
                self.padding_hz
            )));
        }
        if self.ring_seconds == 0 {
            return Err(AudioError::Config("ring duration must be non-zero".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(AudioError::Config("poll interval must be non-zero".into()));
        }
        if self.max_slice == 0 {
            return Err(AudioError::Config("max slice must be non-zero".into()));
        }
        if self.formats.is_empty() {
            return Err(AudioError::Config("no sample formats given".into()));
        }
        Ok(())
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.devices.len().max(1)
    }
}
