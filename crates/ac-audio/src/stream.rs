//! Capture backend boundary and the cpal implementation
//!
//! A backend enumerates input devices and opens streams that deliver raw
//! interleaved bytes to a [`CaptureCallback`]. The callback runs on the
//! backend's realtime thread; it only validates the buffer shape and copies
//! it into the channel's ring.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, Stream, StreamConfig};

use ac_core::{FrameView, PcmFormat};

use crate::device::{DeviceDescriptor, NegotiatedFormat, SupportedInput};
use crate::ringbuf::RingWriter;
use crate::{AudioError, AudioResult};

/// Counters shared between a stream's callbacks and its channel
#[derive(Debug, Default)]
pub struct StreamStatus {
    callbacks: AtomicU64,
    bytes_captured: AtomicU64,
    backend_errors: AtomicU64,
    misaligned_buffers: AtomicU64,
}

impl StreamStatus {
    pub fn callbacks(&self) -> u64 {
        self.callbacks.load(Ordering::Relaxed)
    }

    pub fn bytes_captured(&self) -> u64 {
        self.bytes_captured.load(Ordering::Relaxed)
    }

    pub fn backend_errors(&self) -> u64 {
        self.backend_errors.load(Ordering::Relaxed)
    }

    pub fn misaligned_buffers(&self) -> u64 {
        self.misaligned_buffers.load(Ordering::Relaxed)
    }

    /// Count and log a non-fatal backend error such as an input overrun.
    ///
    /// Returns the running count.
    pub fn report_backend_error(&self, message: impl fmt::Display) -> u64 {
        let count = self.backend_errors.fetch_add(1, Ordering::Relaxed) + 1;
        log::warn!("Input stream error ({} so far): {}", count, message);
        count
    }
}

/// Realtime side of one capture channel
pub struct CaptureCallback {
    writer: RingWriter,
    format: PcmFormat,
    channels: usize,
    status: Arc<StreamStatus>,
}

impl CaptureCallback {
    pub fn new(
        writer: RingWriter,
        negotiated: &NegotiatedFormat,
        status: Arc<StreamStatus>,
    ) -> Self {
        Self {
            writer,
            format: negotiated.format,
            channels: negotiated.channels as usize,
            status,
        }
    }

    #[inline]
    pub fn format(&self) -> PcmFormat {
        self.format
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Deliver one callback's worth of interleaved bytes.
    ///
    /// Never blocks. Once the ring has overflowed every later buffer is
    /// discarded; the drain loop reports the fault.
    pub fn on_data(&mut self, data: &[u8]) {
        self.status.callbacks.fetch_add(1, Ordering::Relaxed);

        if self.writer.has_overflowed() {
            return;
        }

        let view = match FrameView::new(data, self.format, self.channels) {
            Ok(view) => view,
            Err(_) => {
                self.status.misaligned_buffers.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        if self.writer.write(view.as_bytes()).is_ok() {
            self.status
                .bytes_captured
                .fetch_add(view.as_bytes().len() as u64, Ordering::Relaxed);
        }
    }
}

/// An opened input stream
pub trait InputStream {
    /// Begin delivering data to the callback
    fn start(&mut self) -> AudioResult<()>;

    /// Stop delivery and release the callback (and with it the ring writer)
    fn close(self: Box<Self>) -> AudioResult<()>;
}

/// Audio backend: device enumeration and stream creation
pub trait AudioBackend {
    fn name(&self) -> String;

    fn input_devices(&self) -> AudioResult<Vec<DeviceDescriptor>>;

    /// Descriptor of the system default input device
    fn default_input_device(&self) -> AudioResult<DeviceDescriptor> {
        self.input_devices()?
            .into_iter()
            .find(|d| d.is_default)
            .ok_or(AudioError::NoDevice)
    }

    fn open_input(
        &self,
        device: &DeviceDescriptor,
        format: &NegotiatedFormat,
        callback: CaptureCallback,
    ) -> AudioResult<Box<dyn InputStream>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CPAL BACKEND
// ═══════════════════════════════════════════════════════════════════════════════

/// Backend over the platform's default cpal host
pub struct CpalBackend {
    host: Host,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    fn find_cpal_device(&self, id: &str) -> AudioResult<Device> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        for device in devices {
            if device.name().map(|name| name == id).unwrap_or(false) {
                return Ok(device);
            }
        }

        Err(AudioError::DeviceNotFound(id.to_string()))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a cpal sample format onto a decodable PCM format
pub fn pcm_format(format: SampleFormat) -> Option<PcmFormat> {
    match format {
        SampleFormat::I8 => Some(PcmFormat::I8),
        SampleFormat::I16 => Some(PcmFormat::I16),
        SampleFormat::I32 => Some(PcmFormat::I32),
        SampleFormat::U8 => Some(PcmFormat::U8),
        SampleFormat::U16 => Some(PcmFormat::U16),
        SampleFormat::U32 => Some(PcmFormat::U32),
        SampleFormat::F32 => Some(PcmFormat::F32),
        SampleFormat::F64 => Some(PcmFormat::F64),
        _ => None,
    }
}

fn cpal_format(format: PcmFormat) -> SampleFormat {
    match format {
        PcmFormat::I8 => SampleFormat::I8,
        PcmFormat::I16 => SampleFormat::I16,
        PcmFormat::I32 => SampleFormat::I32,
        PcmFormat::U8 => SampleFormat::U8,
        PcmFormat::U16 => SampleFormat::U16,
        PcmFormat::U32 => SampleFormat::U32,
        PcmFormat::F32 => SampleFormat::F32,
        PcmFormat::F64 => SampleFormat::F64,
    }
}

fn describe_device(device: &Device, default_name: Option<&str>) -> Option<DeviceDescriptor> {
    let name = device.name().ok()?;
    let is_default = default_name == Some(name.as_str());

    let mut descriptor = DeviceDescriptor {
        id: name.clone(),
        name,
        is_default,
        ..Default::default()
    };

    match device.supported_input_configs() {
        Ok(configs) => {
            descriptor.supported = configs
                .filter_map(|c| {
                    pcm_format(c.sample_format()).map(|format| SupportedInput {
                        channels: c.channels(),
                        min_rate: c.min_sample_rate().0,
                        max_rate: c.max_sample_rate().0,
                        format,
                    })
                })
                .collect();
        }
        Err(e) => descriptor.probe_error = Some(e.to_string()),
    }

    Some(descriptor)
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> String {
        format!("{:?}", self.host.id())
    }

    fn input_devices(&self) -> AudioResult<Vec<DeviceDescriptor>> {
        let default_name = self
            .host
            .default_input_device()
            .and_then(|d| d.name().ok());

        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok(devices
            .filter_map(|d| describe_device(&d, default_name.as_deref()))
            .collect())
    }

    fn default_input_device(&self) -> AudioResult<DeviceDescriptor> {
        let device = self.host.default_input_device().ok_or(AudioError::NoDevice)?;
        let name = device.name().ok();
        describe_device(&device, name.as_deref()).ok_or(AudioError::NoDevice)
    }

    fn open_input(
        &self,
        device: &DeviceDescriptor,
        format: &NegotiatedFormat,
        mut callback: CaptureCallback,
    ) -> AudioResult<Box<dyn InputStream>> {
        let cpal_device = self.find_cpal_device(&device.id)?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let status = Arc::clone(&callback.status);
        let stream = cpal_device
            .build_input_stream_raw(
                &config,
                cpal_format(format.format),
                move |data: &cpal::Data, _: &cpal::InputCallbackInfo| {
                    callback.on_data(data.bytes());
                },
                move |err| {
                    status.report_backend_error(err);
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        log::info!("Opened '{}': {}", device.name, format);

        Ok(Box::new(CpalInputStream { stream }))
    }
}

struct CpalInputStream {
    stream: Stream,
}

impl InputStream for CpalInputStream {
    fn start(&mut self) -> AudioResult<()> {
        self.stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))
    }

    fn close(self: Box<Self>) -> AudioResult<()> {
        let result = self
            .stream
            .pause()
            .map_err(|e| AudioError::StreamError(e.to_string()));
        // Dropping the stream drops the callback and its ring writer
        drop(self);
        result
    }
}
