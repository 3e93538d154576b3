//! Byte-granular cursor over a chunk queue.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::transport::ChunkQueue;
use crate::Chunk;

/// Result of a [`ChunkCursor::read`] or [`ChunkCursor::drain`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Number of bytes copied into the destination. Equal to the requested
    /// length unless end-of-stream was reached first.
    pub bytes: usize,
    /// `true` once the queue is closed and fully drained. Terminal - every
    /// later call reports zero bytes with this flag set.
    pub finished: bool,
    /// Timestamp of the chunk that supplied the first byte of this call,
    /// or `None` if no bytes were copied.
    pub timestamp: Option<Duration>,
}

/// Where the cursor is in its chunk-consumption state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    /// No chunk held; the next read adopts one from the queue.
    Empty,
    /// Partway through the held chunk.
    Draining,
    /// The queue reported end-of-stream; no further chunks are adopted.
    Finished,
}

/// Shared flag for [`ChunkCursor::wait_drained`].
///
/// The flag tracks the cursor side only: it is cleared on adopt and set
/// again once the held chunk is gone. Waiters therefore combine it with
/// `queue.is_empty()` - queued-but-unadopted chunks must also count as
/// undelivered, or a wait racing the consumer could return early.
struct DrainSignal {
    drained: Mutex<bool>,
    cond: Condvar,
}

impl DrainSignal {
    fn new() -> Self {
        Self {
            drained: Mutex::new(true),
            cond: Condvar::new(),
        }
    }

    fn set(&self, drained: bool) {
        let mut flag = self.drained.lock();
        *flag = drained;
        if drained {
            self.cond.notify_all();
        }
    }

    fn wait(&self, queue: &ChunkQueue) {
        let mut flag = self.drained.lock();
        while !(*flag && queue.is_empty()) {
            self.cond.wait(&mut flag);
        }
    }
}

/// A cloneable handle that can wait for a cursor to finish draining.
///
/// Obtained via [`ChunkCursor::drain_waiter`] before the cursor is moved
/// into a device callback, so teardown logic can still observe it.
#[derive(Clone)]
pub struct DrainWaiter {
    signal: Arc<DrainSignal>,
    queue: Arc<ChunkQueue>,
}

impl DrainWaiter {
    /// Blocks until every chunk handed to the transport has been consumed:
    /// the queue is empty and the cursor holds nothing.
    ///
    /// Intended for use after `quit()`: once the queue is closed, the
    /// drained state is permanent, so this guarantees the last in-flight
    /// chunk reached the hardware sink before it is closed.
    pub fn wait(&self) {
        self.signal.wait(&self.queue);
    }
}

/// Presents a [`ChunkQueue`] as a byte stream, independent of chunk
/// boundaries.
///
/// A cursor is owned by exactly one consumer-side execution context; it is
/// `Send` but not shared. Concurrent access to the underlying queue is
/// arbitrated by the queue itself.
///
/// Each read adopts chunks from the queue as needed, copies partial ranges,
/// and remembers its offset into the chunk currently being drained, so a
/// caller can request byte counts unrelated to how the producer sized its
/// chunks.
///
/// # Example
///
/// ```
/// use audiopipe::{Chunk, ChunkCursor, ChunkQueue};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let queue = Arc::new(ChunkQueue::new(4).unwrap());
/// let mut cursor = ChunkCursor::new(queue);
///
/// cursor.push(Chunk::from_vec(vec![1, 2, 3, 4], Duration::ZERO));
/// cursor.quit();
///
/// let mut buf = [0u8; 3];
/// let outcome = cursor.read(&mut buf);
/// assert_eq!((outcome.bytes, outcome.finished), (3, false));
/// assert_eq!(buf, [1, 2, 3]);
/// ```
pub struct ChunkCursor {
    queue: Arc<ChunkQueue>,
    current: Option<Chunk>,
    offset: usize,
    state: CursorState,
    drain_signal: Arc<DrainSignal>,
}

impl ChunkCursor {
    /// Creates a cursor over the given queue.
    pub fn new(queue: Arc<ChunkQueue>) -> Self {
        Self {
            queue,
            current: None,
            offset: 0,
            state: CursorState::Empty,
            drain_signal: Arc::new(DrainSignal::new()),
        }
    }

    /// Fills `dest` with the next bytes of the stream, blocking for more
    /// chunks as needed.
    ///
    /// Copies exactly `dest.len()` bytes unless end-of-stream is reached
    /// first, in which case the outcome reports fewer bytes with `finished`
    /// set. Zero-length chunks are skipped without stalling.
    pub fn read(&mut self, dest: &mut [u8]) -> ReadOutcome {
        self.fill(dest)
    }

    /// Write-path variant of [`read`](ChunkCursor::read): hands back up to
    /// `dest.len()` bytes for an output device to consume.
    ///
    /// Identical traversal - chunks are adopted, partially copied, and
    /// released in order. Kept distinct so call sites read as what they are.
    pub fn drain(&mut self, dest: &mut [u8]) -> ReadOutcome {
        self.fill(dest)
    }

    fn fill(&mut self, dest: &mut [u8]) -> ReadOutcome {
        if self.state == CursorState::Finished {
            return ReadOutcome {
                bytes: 0,
                finished: true,
                timestamp: None,
            };
        }

        let mut copied = 0;
        let mut timestamp = None;

        while copied < dest.len() {
            let exhausted = match &self.current {
                None => true,
                Some(chunk) => self.offset == chunk.len(),
            };
            if exhausted {
                self.release_current();
                match self.queue.pop() {
                    Some(chunk) => self.adopt(chunk),
                    None => {
                        // Queue closed and drained: report what we have.
                        self.finish();
                        return ReadOutcome {
                            bytes: copied,
                            finished: true,
                            timestamp,
                        };
                    }
                }
            }

            // A freshly adopted zero-length chunk copies nothing here and is
            // released on the next pass.
            if let Some(chunk) = &self.current {
                let n = (dest.len() - copied).min(chunk.len() - self.offset);
                dest[copied..copied + n]
                    .copy_from_slice(&chunk.bytes()[self.offset..self.offset + n]);
                if n > 0 && timestamp.is_none() {
                    timestamp = Some(chunk.timestamp());
                }
                self.offset += n;
                copied += n;
            }
        }

        // Release an exactly-consumed chunk immediately so wait_drained does
        // not hang on a chunk with no bytes left.
        if let Some(chunk) = &self.current {
            if self.offset == chunk.len() {
                self.release_current();
            }
        }

        ReadOutcome {
            bytes: copied,
            finished: false,
            timestamp,
        }
    }

    /// Forwards to the underlying queue's blocking push.
    pub fn push(&self, chunk: Chunk) {
        self.queue.push(chunk);
    }

    /// Forwards to the underlying queue's quit signal.
    ///
    /// In-flight `read`/`drain` calls still complete by draining
    /// already-queued data, then report end-of-stream.
    pub fn quit(&self) {
        self.queue.quit();
    }

    /// Blocks until all data handed to this transport has been fully
    /// consumed: nothing queued, nothing held.
    ///
    /// Used during shutdown, after [`quit`](ChunkCursor::quit), to ensure
    /// the last queued chunk has been drained before closing the sink.
    pub fn wait_drained(&self) {
        self.drain_signal.wait(&self.queue);
    }

    /// Returns a handle for waiting on drain completion from another thread.
    pub fn drain_waiter(&self) -> DrainWaiter {
        DrainWaiter {
            signal: self.drain_signal.clone(),
            queue: self.queue.clone(),
        }
    }

    /// Returns `true` once the cursor has observed end-of-stream.
    pub fn is_finished(&self) -> bool {
        self.state == CursorState::Finished
    }

    fn adopt(&mut self, chunk: Chunk) {
        self.current = Some(chunk);
        self.offset = 0;
        self.state = CursorState::Draining;
        self.drain_signal.set(false);
    }

    fn release_current(&mut self) {
        if self.current.take().is_some() {
            self.offset = 0;
            self.state = CursorState::Empty;
            if self.queue.is_empty() {
                self.drain_signal.set(true);
            }
        }
    }

    fn finish(&mut self) {
        self.current = None;
        self.offset = 0;
        self.state = CursorState::Finished;
        self.drain_signal.set(true);
    }
}
