//! One capture channel: device stream, ring buffer and drain loop
//!
//! The backend callback fills the ring; a dedicated drain thread empties it
//! every poll interval, downmixes each frame to mono, resamples to the output
//! rate and appends the 16-bit result to the channel's shared queue.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ac_core::{FrameView, Sample, to_pcm16};
use ac_dsp::Resampler;

use crate::device::{DeviceDescriptor, NegotiatedFormat, negotiate};
use crate::mux::SharedQueues;
use crate::ringbuf::{RingReader, byte_ring};
use crate::shutdown::ShutdownToken;
use crate::stream::{AudioBackend, CaptureCallback, InputStream, StreamStatus};
use crate::{AudioError, AudioResult, CaptureConfig};

/// Re-check interval while waiting for a closed stream to release its ring
const STOP_POLL: Duration = Duration::from_millis(5);

/// Upper bound on waiting for the ring writer after shutdown
const STOP_GRACE: Duration = Duration::from_secs(2);

// ═══════════════════════════════════════════════════════════════════════════════
// STATE MACHINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Capture channel lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Opened,
    Streaming,
    Draining,
    Stopped,
    Error,
}

impl ChannelState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Opened => "opened",
            Self::Streaming => "streaming",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }

    pub fn can_transition_to(self, next: ChannelState) -> bool {
        use ChannelState::*;
        match (self, next) {
            (Idle, Opened) | (Opened, Streaming) | (Streaming, Draining) | (Draining, Stopped) => {
                true
            }
            // A channel opened but never started still drains its stream
            (Opened, Draining) => true,
            (from, Error) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DRAIN LOOP
// ═══════════════════════════════════════════════════════════════════════════════

/// Counters of one drain thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub bytes_read: u64,
    pub frames_in: u64,
    pub samples_out: u64,
    pub cycles: u64,
}

/// Ring consumer, resampler and queue producer of one channel
pub struct DrainLoop {
    index: usize,
    reader: RingReader,
    resampler: Resampler,
    format: NegotiatedFormat,
    queues: Arc<SharedQueues>,
    shutdown: ShutdownToken,
    poll_interval: Duration,
    bytes: Vec<u8>,
    resampled: Vec<Sample>,
    pcm: Vec<i16>,
    stats: DrainStats,
}

impl DrainLoop {
    pub fn new(
        index: usize,
        reader: RingReader,
        resampler: Resampler,
        format: NegotiatedFormat,
        queues: Arc<SharedQueues>,
        shutdown: ShutdownToken,
        poll_interval: Duration,
    ) -> Self {
        Self {
            index,
            reader,
            resampler,
            format,
            queues,
            shutdown,
            poll_interval,
            bytes: Vec::new(),
            resampled: Vec::new(),
            pcm: Vec::new(),
            stats: DrainStats::default(),
        }
    }

    #[inline]
    pub fn stats(&self) -> DrainStats {
        self.stats
    }

    /// Run until the ring writer is released after shutdown, or a fault.
    ///
    /// A fault trips the shared shutdown token before returning.
    pub fn run(mut self) -> AudioResult<DrainStats> {
        let result = self.run_inner();
        if let Err(e) = &result {
            log::error!("Channel {}: {}", self.index, e);
            self.shutdown.trigger(format!("channel {} failed", self.index));
        }
        result.map(|()| self.stats)
    }

    fn run_inner(&mut self) -> AudioResult<()> {
        let mut stop_seen: Option<Instant> = None;

        loop {
            let stopping = match stop_seen {
                Some(_) => {
                    thread::sleep(STOP_POLL);
                    true
                }
                None => self.shutdown.wait_timeout(self.poll_interval),
            };

            if let Some(err) = self.reader.overflow() {
                return Err(err);
            }
            self.drain_once()?;

            if self.reader.is_abandoned() {
                // Writer gone: whatever it committed is visible now
                self.drain_once()?;
                log::debug!("Channel {}: ring released, drain finished", self.index);
                return Ok(());
            }

            if stopping {
                let since = *stop_seen.get_or_insert_with(Instant::now);
                if since.elapsed() >= STOP_GRACE {
                    log::warn!(
                        "Channel {}: stream still holds its ring after shutdown, giving up",
                        self.index
                    );
                    self.drain_once()?;
                    return Ok(());
                }
            }
        }
    }

    /// Consume every whole frame in the ring.
    ///
    /// Returns the number of resampled samples appended to the queue.
    pub fn drain_once(&mut self) -> AudioResult<usize> {
        let frame_bytes = self.format.frame_bytes();
        let read = self.reader.read_frames(frame_bytes, &mut self.bytes);
        if read == 0 {
            return Ok(0);
        }

        let view = FrameView::new(&self.bytes, self.format.format, self.format.channels as usize)
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        self.resampled.clear();
        for mono in view.mono_samples() {
            self.resampler.insert(mono, &mut self.resampled);
        }

        self.pcm.clear();
        self.pcm.extend(self.resampled.iter().map(|&s| to_pcm16(s)));
        self.queues.append(self.index, &self.pcm);

        self.stats.bytes_read += read as u64;
        self.stats.frames_in += view.frames() as u64;
        self.stats.samples_out += self.pcm.len() as u64;
        self.stats.cycles += 1;

        log::debug!(
            "Channel {}: {} bytes -> {} samples",
            self.index,
            read,
            self.pcm.len()
        );
        Ok(self.pcm.len())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CAPTURE CHANNEL
// ═══════════════════════════════════════════════════════════════════════════════

/// One input device feeding one output channel
pub struct CaptureChannel {
    index: usize,
    device: DeviceDescriptor,
    format: NegotiatedFormat,
    state: ChannelState,
    stream: Option<Box<dyn InputStream>>,
    drain: Option<DrainLoop>,
    handle: Option<JoinHandle<AudioResult<DrainStats>>>,
    status: Arc<StreamStatus>,
}

impl CaptureChannel {
    /// Negotiate a format, size the ring and open the device stream
    pub fn open<B: AudioBackend + ?Sized>(
        index: usize,
        backend: &B,
        device: DeviceDescriptor,
        config: &CaptureConfig,
        queues: Arc<SharedQueues>,
        shutdown: ShutdownToken,
    ) -> AudioResult<Self> {
        let mut state = ChannelState::Idle;
        log::info!("Channel {}: input device '{}'", index, device.name);

        let format = negotiate(&device, &config.formats, &config.sample_rates)?;

        let resampler = Resampler::new(
            format.sample_rate as f64,
            config.output_rate as f64,
            config.padding_hz,
        )?;

        let capacity =
            config.ring_seconds as usize * format.sample_rate as usize * format.frame_bytes();
        let (writer, reader) = byte_ring(capacity);
        let status = Arc::new(StreamStatus::default());

        let callback = CaptureCallback::new(writer, &format, Arc::clone(&status));
        let stream = backend.open_input(&device, &format, callback)?;

        transition(index, &mut state, ChannelState::Opened)?;
        log::info!(
            "Channel {}: {} ({} byte ring), {}Hz -> {}Hz",
            index,
            format,
            capacity,
            format.sample_rate,
            config.output_rate
        );

        let drain = DrainLoop::new(
            index,
            reader,
            resampler,
            format,
            queues,
            shutdown,
            config.poll_interval(),
        );

        Ok(Self {
            index,
            device,
            format,
            state,
            stream: Some(stream),
            drain: Some(drain),
            handle: None,
            status,
        })
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    #[inline]
    pub fn format(&self) -> NegotiatedFormat {
        self.format
    }

    #[inline]
    pub fn state(&self) -> ChannelState {
        self.state
    }

    #[inline]
    pub fn status(&self) -> &StreamStatus {
        &self.status
    }

    /// Start the device stream and spawn the drain thread
    pub fn start(&mut self) -> AudioResult<()> {
        transition(self.index, &mut self.state, ChannelState::Streaming)?;

        let result = self.start_inner();
        if result.is_err() {
            self.state = ChannelState::Error;
        }
        result
    }

    fn start_inner(&mut self) -> AudioResult<()> {
        let drain = self.drain.take().ok_or(AudioError::InvalidState {
            channel: self.index,
            from: self.state.name(),
            to: ChannelState::Streaming.name(),
        })?;

        if let Some(stream) = self.stream.as_mut() {
            stream.start()?;
        }

        let handle = thread::Builder::new()
            .name(format!("drain-{}", self.index))
            .spawn(move || drain.run())
            .map_err(|e| AudioError::StreamError(format!("drain thread: {}", e)))?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Close the device stream; the drain thread then flushes what is left
    pub fn stop(&mut self) -> AudioResult<()> {
        if self.state.is_terminal() || self.state == ChannelState::Draining {
            return Ok(());
        }
        transition(self.index, &mut self.state, ChannelState::Draining)?;

        match self.stream.take() {
            Some(stream) => stream.close(),
            None => Ok(()),
        }
    }

    /// Wait for the drain thread and settle the final state
    pub fn join(&mut self) -> AudioResult<DrainStats> {
        let result = match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or(Err(AudioError::ChannelPanicked(self.index))),
            None => Ok(self.drain.as_ref().map(DrainLoop::stats).unwrap_or_default()),
        };

        self.state = match (&result, self.state) {
            (Ok(_), ChannelState::Draining) => ChannelState::Stopped,
            (Ok(_), state) => state,
            (Err(_), _) => ChannelState::Error,
        };
        result
    }
}

impl fmt::Debug for CaptureChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureChannel")
            .field("index", &self.index)
            .field("device", &self.device.name)
            .field("format", &self.format)
            .field("state", &self.state)
            .finish()
    }
}

fn transition(channel: usize, state: &mut ChannelState, next: ChannelState) -> AudioResult<()> {
    if !state.can_transition_to(next) {
        return Err(AudioError::InvalidState {
            channel,
            from: state.name(),
            to: next.name(),
        });
    }
    log::trace!("Channel {}: {} -> {}", channel, state, next);
    *state = next;
    Ok(())
}
