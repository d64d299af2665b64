//! Cross-channel synchronization and interleaving
//!
//! Every channel's resampled output lands in one [`SharedQueues`] guarded by
//! a single mutex, so the multiplexer always sees a consistent snapshot of
//! all queue lengths. Sample `k` of every channel is written together or not
//! at all.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use ac_core::OUTPUT_BYTES_PER_SAMPLE;

use crate::shutdown::ShutdownToken;
use crate::{AudioError, AudioResult};

/// Per-channel queues of resampled 16-bit samples
#[derive(Debug, Default)]
pub struct ChannelQueues {
    channels: Vec<VecDeque<i16>>,
}

impl ChannelQueues {
    pub fn new(channel_count: usize) -> Self {
        Self {
            channels: vec![VecDeque::new(); channel_count],
        }
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples available on every channel
    pub fn aligned_len(&self) -> usize {
        self.channels.iter().map(VecDeque::len).min().unwrap_or(0)
    }

    pub fn lengths(&self) -> Vec<usize> {
        self.channels.iter().map(VecDeque::len).collect()
    }

    /// Pop `frames` samples from every channel, appending them interleaved
    /// in channel order as little-endian bytes.
    fn interleave_into(&mut self, frames: usize, out: &mut Vec<u8>) {
        out.reserve(frames * self.channels.len() * OUTPUT_BYTES_PER_SAMPLE);
        for _ in 0..frames {
            for queue in self.channels.iter_mut() {
                if let Some(sample) = queue.pop_front() {
                    out.extend_from_slice(&sample.to_le_bytes());
                }
            }
        }
    }
}

/// Queues plus the condition variable producers signal after appending
#[derive(Debug)]
pub struct SharedQueues {
    queues: Mutex<ChannelQueues>,
    ready: Condvar,
}

impl SharedQueues {
    pub fn new(channel_count: usize) -> Self {
        Self {
            queues: Mutex::new(ChannelQueues::new(channel_count)),
            ready: Condvar::new(),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.queues.lock().channel_count()
    }

    /// Append resampled samples to `channel` and wake the multiplexer
    pub fn append(&self, channel: usize, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }
        {
            let mut queues = self.queues.lock();
            if let Some(queue) = queues.channels.get_mut(channel) {
                queue.extend(samples.iter().copied());
            }
        }
        self.ready.notify_all();
    }

    pub fn lengths(&self) -> Vec<usize> {
        self.queues.lock().lengths()
    }

    /// Wake any waiter without adding data
    pub fn notify(&self) {
        self.ready.notify_all();
    }
}

/// Counters reported at shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MuxStats {
    pub frames_written: u64,
    pub bytes_written: u64,
    pub cycles: u64,
}

/// Interleaves aligned slices of every channel into the output sink
pub struct Multiplexer<W: Write> {
    queues: Arc<SharedQueues>,
    sink: W,
    max_slice: usize,
    poll_interval: Duration,
    scratch: Vec<u8>,
    stats: MuxStats,
}

impl<W: Write> Multiplexer<W> {
    pub fn new(
        queues: Arc<SharedQueues>,
        sink: W,
        max_slice: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queues,
            sink,
            max_slice: max_slice.max(1),
            poll_interval,
            scratch: Vec::new(),
            stats: MuxStats::default(),
        }
    }

    #[inline]
    pub fn stats(&self) -> MuxStats {
        self.stats
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    /// One multiplex cycle: wait up to the poll interval for every channel to
    /// have data, then write at most `max_slice` frames.
    ///
    /// Returns the number of frames written; `0` means no data yet.
    pub fn cycle(&mut self) -> AudioResult<usize> {
        let frames = {
            let mut queues = self.queues.queues.lock();
            if queues.aligned_len() == 0 {
                self.queues
                    .ready
                    .wait_for(&mut queues, self.poll_interval);
            }

            let frames = queues.aligned_len().min(self.max_slice);
            if frames == 0 {
                return Ok(0);
            }

            self.scratch.clear();
            queues.interleave_into(frames, &mut self.scratch);
            frames
        };

        self.write_scratch(frames)?;
        Ok(frames)
    }

    /// Write everything that is aligned across channels without waiting.
    ///
    /// Used once the producers have stopped; unaligned tails stay queued.
    pub fn flush_aligned(&mut self) -> AudioResult<usize> {
        let mut total = 0;
        loop {
            let frames = {
                let mut queues = self.queues.queues.lock();
                let frames = queues.aligned_len().min(self.max_slice);
                if frames == 0 {
                    break;
                }
                self.scratch.clear();
                queues.interleave_into(frames, &mut self.scratch);
                frames
            };
            self.write_scratch(frames)?;
            total += frames;
        }
        self.sink.flush().map_err(AudioError::SinkWriteError)?;
        Ok(total)
    }

    /// Cycle until `shutdown` is triggered or writing fails
    pub fn run(&mut self, shutdown: &ShutdownToken) -> AudioResult<()> {
        while !shutdown.is_triggered() {
            self.cycle()?;
        }
        Ok(())
    }

    fn write_scratch(&mut self, frames: usize) -> AudioResult<()> {
        self.sink
            .write_all(&self.scratch)
            .map_err(AudioError::SinkWriteError)?;
        self.sink.flush().map_err(AudioError::SinkWriteError)?;

        self.stats.frames_written += frames as u64;
        self.stats.bytes_written += self.scratch.len() as u64;
        self.stats.cycles += 1;

        log::trace!("Multiplexed {} frames ({} bytes)", frames, self.scratch.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn test_interleaves_in_channel_order() {
        let queues = Arc::new(SharedQueues::new(2));
        queues.append(0, &[1, 2, 3]);
        queues.append(1, &[10, 20, 30]);

        let mut mux =
            Multiplexer::new(Arc::clone(&queues), Vec::<u8>::new(), 10240, Duration::ZERO);
        assert_eq!(mux.cycle().unwrap(), 3);

        assert_eq!(samples(&mux.into_sink()), vec![1, 10, 2, 20, 3, 30]);
        assert_eq!(queues.lengths(), vec![0, 0]);
    }

    #[test]
    fn test_waits_for_slowest_channel() {
        let queues = Arc::new(SharedQueues::new(2));
        queues.append(0, &[1, 2, 3]);
        queues.append(1, &[10]);

        let mut mux =
            Multiplexer::new(Arc::clone(&queues), Vec::<u8>::new(), 10240, Duration::ZERO);
        assert_eq!(mux.cycle().unwrap(), 1);
        assert_eq!(queues.lengths(), vec![2, 0]);
        assert_eq!(mux.cycle().unwrap(), 0);
        assert_eq!(samples(&mux.into_sink()), vec![1, 10]);
    }

    #[test]
    fn test_slice_is_capped() {
        let queues = Arc::new(SharedQueues::new(1));
        queues.append(0, &[7; 5]);

        let mut mux = Multiplexer::new(Arc::clone(&queues), Vec::<u8>::new(), 2, Duration::ZERO);
        assert_eq!(mux.cycle().unwrap(), 2);
        assert_eq!(queues.lengths(), vec![3]);

        assert_eq!(mux.flush_aligned().unwrap(), 3);
        assert_eq!(mux.stats().frames_written, 5);
        assert_eq!(mux.stats().bytes_written, 10);
    }

    #[test]
    fn test_negative_samples_little_endian() {
        let queues = Arc::new(SharedQueues::new(1));
        queues.append(0, &[-2]);

        let mut mux = Multiplexer::new(queues, Vec::<u8>::new(), 16, Duration::ZERO);
        mux.cycle().unwrap();
        assert_eq!(mux.into_sink(), vec![0xFE, 0xFF]);
    }

    #[test]
    fn test_append_wakes_waiting_cycle() {
        let queues = Arc::new(SharedQueues::new(1));
        let producer = Arc::clone(&queues);

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.append(0, &[5]);
        });

        let mut mux = Multiplexer::new(queues, Vec::<u8>::new(), 16, Duration::from_secs(5));
        let start = std::time::Instant::now();
        let mut written = 0;
        while written == 0 {
            written = mux.cycle().unwrap();
        }
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_failure_is_typed() {
        let queues = Arc::new(SharedQueues::new(1));
        queues.append(0, &[1]);

        let mut mux = Multiplexer::new(queues, FailingSink, 16, Duration::ZERO);
        assert!(matches!(mux.cycle(), Err(AudioError::SinkWriteError(_))));
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let queues = Arc::new(SharedQueues::new(1));
        let shutdown = ShutdownToken::new();
        shutdown.trigger("test");

        let mut mux = Multiplexer::new(queues, Vec::<u8>::new(), 16, Duration::from_millis(1));
        mux.run(&shutdown).unwrap();
        assert_eq!(mux.stats(), MuxStats::default());
    }
}
