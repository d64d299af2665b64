//! Byte ring between the realtime callback and the drain loop
//!
//! Single producer (backend callback), single consumer (drain thread).
//! CRITICAL: the producer side never blocks and never allocates.
//!
//! A write that does not fit is rejected whole: nothing is copied and the
//! cursors stay where they were. The rejection is latched so the drain loop
//! can turn it into a fatal error on its own thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rtrb::chunks::ChunkError;
use rtrb::{Consumer, Producer, RingBuffer};

use crate::{AudioError, AudioResult};

/// Overflow latch shared by both ends
#[derive(Debug, Default)]
struct OverflowLatch {
    tripped: AtomicBool,
    requested: AtomicUsize,
    free: AtomicUsize,
}

impl OverflowLatch {
    fn trip(&self, requested: usize, free: usize) {
        if !self.tripped.load(Ordering::Relaxed) {
            self.requested.store(requested, Ordering::Relaxed);
            self.free.store(free, Ordering::Relaxed);
            self.tripped.store(true, Ordering::Release);
        }
    }

    fn error(&self) -> Option<AudioError> {
        if self.tripped.load(Ordering::Acquire) {
            Some(AudioError::RingOverflow {
                requested: self.requested.load(Ordering::Relaxed),
                free: self.free.load(Ordering::Relaxed),
            })
        } else {
            None
        }
    }
}

/// Create a ring of `capacity` bytes
pub fn byte_ring(capacity: usize) -> (RingWriter, RingReader) {
    let (producer, consumer) = RingBuffer::new(capacity);
    let latch = Arc::new(OverflowLatch::default());

    (
        RingWriter {
            producer,
            latch: Arc::clone(&latch),
        },
        RingReader {
            consumer,
            latch,
            capacity,
        },
    )
}

/// Producer end, owned by the realtime callback
pub struct RingWriter {
    producer: Producer<u8>,
    latch: Arc<OverflowLatch>,
}

impl RingWriter {
    /// Free bytes
    #[inline]
    pub fn free(&self) -> usize {
        self.producer.slots()
    }

    /// Copy all of `bytes` into the ring, or nothing
    pub fn write(&mut self, bytes: &[u8]) -> AudioResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        match self.producer.write_chunk(bytes.len()) {
            Ok(mut chunk) => {
                let (first, second) = chunk.as_mut_slices();
                let split = first.len();
                first.copy_from_slice(&bytes[..split]);
                second.copy_from_slice(&bytes[split..]);
                chunk.commit_all();
                Ok(())
            }
            Err(ChunkError::TooFewSlots(free)) => {
                self.latch.trip(bytes.len(), free);
                Err(AudioError::RingOverflow {
                    requested: bytes.len(),
                    free,
                })
            }
        }
    }

    /// True once any write has been rejected
    #[inline]
    pub fn has_overflowed(&self) -> bool {
        self.latch.tripped.load(Ordering::Relaxed)
    }
}

/// Consumer end, owned by the drain loop
pub struct RingReader {
    consumer: Consumer<u8>,
    latch: Arc<OverflowLatch>,
    capacity: usize,
}

impl RingReader {
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Filled bytes
    #[inline]
    pub fn fill_count(&self) -> usize {
        self.consumer.slots()
    }

    /// True once the writer has been dropped
    #[inline]
    pub fn is_abandoned(&self) -> bool {
        self.consumer.is_abandoned()
    }

    /// The latched overflow, if the writer ever rejected a write
    pub fn overflow(&self) -> Option<AudioError> {
        self.latch.error()
    }

    /// Move every complete frame into `out` (replacing its contents) and
    /// advance the read cursor by exactly that many bytes.
    ///
    /// Returns the number of bytes read.
    pub fn read_frames(&mut self, frame_bytes: usize, out: &mut Vec<u8>) -> usize {
        out.clear();
        if frame_bytes == 0 {
            return 0;
        }

        let available = self.consumer.slots();
        let whole = available - available % frame_bytes;
        if whole == 0 {
            return 0;
        }

        match self.consumer.read_chunk(whole) {
            Ok(chunk) => {
                let (first, second) = chunk.as_slices();
                out.extend_from_slice(first);
                out.extend_from_slice(second);
                chunk.commit_all();
                whole
            }
            Err(ChunkError::TooFewSlots(_)) => 0,
        }
    }
}
