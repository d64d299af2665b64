//! Raw PCM formats and interleaved frame access
//!
//! Capture backends hand over native-endian interleaved bytes. [`FrameView`]
//! interprets such a buffer with an explicit stride (the channel count) and
//! bounds-checked indexing, so no caller does pointer arithmetic on raw audio.

use dasp_sample::Sample as DaspSample;
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, Sample, downmix};

/// Native-endian PCM sample encodings a capture device may deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PcmFormat {
    I8,
    I16,
    I32,
    U8,
    U16,
    U32,
    F32,
    F64,
}

impl PcmFormat {
    /// Size of one sample of one channel
    #[inline]
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::I8 => "s8",
            Self::I16 => "s16ne",
            Self::I32 => "s32ne",
            Self::U8 => "u8",
            Self::U16 => "u16ne",
            Self::U32 => "u32ne",
            Self::F32 => "float32ne",
            Self::F64 => "float64ne",
        }
    }

    /// Decode one sample; `bytes` must be exactly [`bytes_per_sample`](Self::bytes_per_sample) long
    pub fn decode(self, bytes: &[u8]) -> Option<Sample> {
        if bytes.len() != self.bytes_per_sample() {
            return None;
        }

        let sample = match self {
            Self::I8 => i8::from_ne_bytes([bytes[0]]).to_sample::<Sample>(),
            Self::U8 => bytes[0].to_sample::<Sample>(),
            Self::I16 => i16::from_ne_bytes(bytes.try_into().ok()?).to_sample::<Sample>(),
            Self::U16 => u16::from_ne_bytes(bytes.try_into().ok()?).to_sample::<Sample>(),
            Self::I32 => i32::from_ne_bytes(bytes.try_into().ok()?).to_sample::<Sample>(),
            Self::U32 => u32::from_ne_bytes(bytes.try_into().ok()?).to_sample::<Sample>(),
            Self::F32 => f32::from_ne_bytes(bytes.try_into().ok()?).to_sample::<Sample>(),
            Self::F64 => f64::from_ne_bytes(bytes.try_into().ok()?),
        };

        Some(sample)
    }

    /// Encode one normalized sample, appending its native-endian bytes
    pub fn encode(self, sample: Sample, out: &mut Vec<u8>) {
        let sample = sample.clamp(-1.0, 1.0);
        match self {
            Self::I8 => out.extend_from_slice(&sample.to_sample::<i8>().to_ne_bytes()),
            Self::U8 => out.push(sample.to_sample::<u8>()),
            Self::I16 => out.extend_from_slice(&sample.to_sample::<i16>().to_ne_bytes()),
            Self::U16 => out.extend_from_slice(&sample.to_sample::<u16>().to_ne_bytes()),
            Self::I32 => out.extend_from_slice(&sample.to_sample::<i32>().to_ne_bytes()),
            Self::U32 => out.extend_from_slice(&sample.to_sample::<u32>().to_ne_bytes()),
            Self::F32 => out.extend_from_slice(&(sample as f32).to_ne_bytes()),
            Self::F64 => out.extend_from_slice(&sample.to_ne_bytes()),
        }
    }
}

impl std::fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed, read-only view over an interleaved PCM buffer
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    data: &'a [u8],
    format: PcmFormat,
    channels: usize,
}

impl<'a> FrameView<'a> {
    /// Wrap `data`, which must hold a whole number of frames
    pub fn new(data: &'a [u8], format: PcmFormat, channels: usize) -> CoreResult<Self> {
        if channels == 0 {
            return Err(CoreError::InvalidChannelCount(channels));
        }

        let frame_bytes = format.bytes_per_sample() * channels;
        if data.len() % frame_bytes != 0 {
            return Err(CoreError::MisalignedBuffer {
                len: data.len(),
                frame_bytes,
            });
        }

        Ok(Self {
            data,
            format,
            channels,
        })
    }

    /// Underlying bytes, whole frames only
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    #[inline]
    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Stride between consecutive samples of the same channel, in samples
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn frame_bytes(&self) -> usize {
        self.format.bytes_per_sample() * self.channels
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.data.len() / self.frame_bytes()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample `channel` of frame `frame`, or `None` when out of bounds
    pub fn sample(&self, frame: usize, channel: usize) -> Option<Sample> {
        if channel >= self.channels || frame >= self.frames() {
            return None;
        }

        let width = self.format.bytes_per_sample();
        let start = frame * self.frame_bytes() + channel * width;
        self.data
            .get(start..start + width)
            .and_then(|bytes| self.format.decode(bytes))
    }

    /// Mean of all channels of frame `frame`
    pub fn mono(&self, frame: usize) -> Option<Sample> {
        if frame >= self.frames() {
            return None;
        }

        // Up to 8 channels stay on the stack
        let mut scratch = [0.0; 8];
        if self.channels <= scratch.len() {
            for (channel, slot) in scratch[..self.channels].iter_mut().enumerate() {
                *slot = self.sample(frame, channel)?;
            }
            Some(downmix(&scratch[..self.channels]))
        } else {
            let frame_samples: Option<Vec<Sample>> = (0..self.channels)
                .map(|channel| self.sample(frame, channel))
                .collect();
            frame_samples.map(|samples| downmix(&samples))
        }
    }

    /// Iterate the buffer as mono samples, one per frame
    pub fn mono_samples(&self) -> impl Iterator<Item = Sample> + '_ {
        (0..self.frames()).filter_map(move |frame| self.mono(frame))
    }
}
