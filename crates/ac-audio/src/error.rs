//! Audio error types

use thiserror::Error;

use ac_dsp::DspError;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio device found")]
    NoDevice,

    #[error("Input device '{0}' not available")]
    DeviceNotFound(String),

    #[error("Unable to probe device '{device}': {reason}")]
    ProbeError { device: String, reason: String },

    #[error("No supported sample format on device '{0}'")]
    UnsupportedFormat(String),

    #[error("Failed to build stream: {0}")]
    StreamBuildError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Ring buffer overflow: {requested} bytes requested, {free} free")]
    RingOverflow { requested: usize, free: usize },

    #[error("Invalid resampler filter: {0}")]
    InvalidFilterSpec(#[from] DspError),

    #[error("Output write failed: {0}")]
    SinkWriteError(#[from] std::io::Error),

    #[error("Channel {channel}: invalid transition {from} -> {to}")]
    InvalidState {
        channel: usize,
        from: &'static str,
        to: &'static str,
    },

    #[error("Drain thread of channel {0} panicked")]
    ChannelPanicked(usize),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type AudioResult<T> = Result<T, AudioError>;

impl From<serde_json::Error> for AudioError {
    fn from(err: serde_json::Error) -> Self {
        AudioError::Config(err.to_string())
    }
}
