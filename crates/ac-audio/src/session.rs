//! Capture session: channel setup, multiplexing and orderly shutdown
//!
//! [`CaptureSession::open`] does everything that can fail up front: device
//! lookup, format negotiation, filter design and stream creation. The
//! returned [`OpenedCapture`] then runs the multiplexer on the calling
//! thread until the shared [`ShutdownToken`] trips (signal, sink failure or
//! a channel fault). It then closes every stream, joins every drain thread,
//! writes whatever is still aligned across channels and reports the first
//! error.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use crate::channel::{CaptureChannel, DrainStats};
use crate::device::{DeviceDescriptor, NegotiatedFormat, find_device};
use crate::mux::{Multiplexer, MuxStats, SharedQueues};
use crate::shutdown::ShutdownToken;
use crate::stream::AudioBackend;
use crate::{AudioError, AudioResult, CaptureConfig};

/// Per-channel figures at shutdown
#[derive(Debug, Clone, Default)]
pub struct ChannelStats {
    pub device: String,
    pub format: Option<NegotiatedFormat>,
    pub drain: DrainStats,
    /// Samples left unaligned in the queue at shutdown
    pub samples_dropped: usize,
    pub backend_errors: u64,
}

/// Session-wide figures at shutdown
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub mux: MuxStats,
    pub channels: Vec<ChannelStats>,
}

impl SessionStats {
    pub fn log_summary(&self) {
        log::info!(
            "Wrote {} frames ({} bytes) in {} cycles",
            self.mux.frames_written,
            self.mux.bytes_written,
            self.mux.cycles
        );
        for (i, ch) in self.channels.iter().enumerate() {
            log::info!(
                "Channel {} '{}': {} frames in, {} samples out, {} dropped, {} backend errors",
                i,
                ch.device,
                ch.drain.frames_in,
                ch.drain.samples_out,
                ch.samples_dropped,
                ch.backend_errors
            );
        }
    }
}

/// Outcome of [`CaptureSession::run`]: statistics are available even on failure
#[derive(Debug)]
pub struct SessionReport {
    pub stats: SessionStats,
    pub error: Option<AudioError>,
}

impl SessionReport {
    pub fn into_result(self) -> AudioResult<SessionStats> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.stats),
        }
    }
}

fn record(err: AudioError, first_error: &mut Option<AudioError>) {
    if first_error.is_none() {
        *first_error = Some(err);
    } else {
        log::warn!("Additional error during shutdown: {}", err);
    }
}

/// Multi-channel capture session over an audio backend
pub struct CaptureSession<'a, B: AudioBackend + ?Sized> {
    backend: &'a B,
    config: CaptureConfig,
}

impl<'a, B: AudioBackend + ?Sized> CaptureSession<'a, B> {
    pub fn new(backend: &'a B, config: CaptureConfig) -> AudioResult<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    #[inline]
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Descriptors of the configured devices, in channel order
    pub fn resolve_devices(&self) -> AudioResult<Vec<DeviceDescriptor>> {
        if self.config.devices.is_empty() {
            let device = self.backend.default_input_device()?;
            log::info!("Using default input device '{}'", device.name);
            return Ok(vec![device]);
        }

        let available = self.backend.input_devices()?;
        self.config
            .devices
            .iter()
            .map(|id| find_device(&available, id).cloned())
            .collect()
    }

    /// Resolve every device, negotiate formats, build the resamplers and
    /// open the streams, without starting them.
    ///
    /// Nothing has been written anywhere when this fails; channels opened
    /// before the failing one are closed again.
    pub fn open(&self, shutdown: &ShutdownToken) -> AudioResult<OpenedCapture> {
        let devices = self.resolve_devices()?;
        let queues = Arc::new(SharedQueues::new(devices.len()));
        let mut channels: Vec<CaptureChannel> = Vec::with_capacity(devices.len());

        for (index, device) in devices.into_iter().enumerate() {
            match CaptureChannel::open(
                index,
                self.backend,
                device,
                &self.config,
                Arc::clone(&queues),
                shutdown.clone(),
            ) {
                Ok(channel) => channels.push(channel),
                Err(err) => {
                    for channel in channels.iter_mut() {
                        if let Err(close_err) = channel.stop() {
                            log::warn!("Channel {}: {}", channel.index(), close_err);
                        }
                    }
                    return Err(err);
                }
            }
        }

        Ok(OpenedCapture {
            channels,
            queues,
            max_slice: self.config.max_slice,
            poll_interval: self.config.poll_interval(),
            output_rate: self.config.output_rate,
        })
    }

    /// Open every channel and capture into `sink` until `shutdown` trips
    pub fn run<W: Write>(&self, sink: &mut W, shutdown: &ShutdownToken) -> SessionReport {
        match self.open(shutdown) {
            Ok(capture) => capture.run(sink, shutdown),
            Err(err) => SessionReport {
                stats: SessionStats::default(),
                error: Some(err),
            },
        }
    }
}

/// Channels with negotiated formats and open streams, not yet capturing
#[derive(Debug)]
pub struct OpenedCapture {
    channels: Vec<CaptureChannel>,
    queues: Arc<SharedQueues>,
    max_slice: usize,
    poll_interval: Duration,
    output_rate: u32,
}

impl OpenedCapture {
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Negotiated input format of every channel, in channel order
    pub fn formats(&self) -> Vec<NegotiatedFormat> {
        self.channels.iter().map(CaptureChannel::format).collect()
    }

    /// Start every stream and multiplex into `sink` until `shutdown` trips
    pub fn run<W: Write>(mut self, sink: &mut W, shutdown: &ShutdownToken) -> SessionReport {
        let mut first_error: Option<AudioError> = None;

        for channel in self.channels.iter_mut() {
            if let Err(err) = channel.start() {
                record(err, &mut first_error);
                break;
            }
        }

        let mut mux = Multiplexer::new(
            Arc::clone(&self.queues),
            &mut *sink,
            self.max_slice,
            self.poll_interval,
        );

        if first_error.is_none() {
            log::info!(
                "Capturing {} channel(s) at {}Hz",
                self.channels.len(),
                self.output_rate
            );
            if let Err(err) = mux.run(shutdown) {
                log::error!("Multiplexer: {}", err);
                record(err, &mut first_error);
            }
        }
        shutdown.trigger("capture stopped");

        for channel in self.channels.iter_mut() {
            if let Err(err) = channel.stop() {
                record(err, &mut first_error);
            }
        }

        let mut channel_stats = Vec::with_capacity(self.channels.len());
        for channel in self.channels.iter_mut() {
            let drain = match channel.join() {
                Ok(stats) => stats,
                Err(err) => {
                    record(err, &mut first_error);
                    DrainStats::default()
                }
            };
            channel_stats.push(ChannelStats {
                device: channel.device().name.clone(),
                format: Some(channel.format()),
                drain,
                samples_dropped: 0,
                backend_errors: channel.status().backend_errors(),
            });
        }

        let sink_failed = matches!(first_error, Some(AudioError::SinkWriteError(_)));
        if !sink_failed {
            if let Err(err) = mux.flush_aligned() {
                record(err, &mut first_error);
            }
        }

        for (stats, dropped) in channel_stats.iter_mut().zip(self.queues.lengths()) {
            stats.samples_dropped = dropped;
        }

        let stats = SessionStats {
            mux: mux.stats(),
            channels: channel_stats,
        };
        stats.log_summary();

        SessionReport {
            stats,
            error: first_error,
        }
    }
}
