//! Bounded, blocking, quittable chunk queue.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::{AudioPipeError, Chunk};

struct QueueInner {
    items: VecDeque<Chunk>,
    quitting: bool,
}

/// A fixed-capacity thread-safe FIFO of [`Chunk`]s.
///
/// This is the boundary between the real-time audio side and the
/// request-handling side:
///
/// - [`push`](ChunkQueue::push) blocks while the queue is full, throttling
///   the producer to the consumer's pace (backpressure).
/// - [`pop`](ChunkQueue::pop) blocks while the queue is empty.
/// - [`quit`](ChunkQueue::quit) is a one-way close signal: it wakes every
///   blocked producer and consumer, rejects all future pushes, and lets
///   consumers drain whatever was queued before the signal.
///
/// Blocking happens on a mutex-protected condition variable pair; nothing
/// spins. There is no per-call timeout - a caller needing a deadline races
/// the blocking call against an external timer that calls `quit()`.
///
/// Chunks are observed in strict FIFO order.
pub struct ChunkQueue {
    capacity: usize,
    inner: Mutex<QueueInner>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl ChunkQueue {
    /// Creates a queue holding at most `capacity` chunks.
    ///
    /// # Errors
    ///
    /// Returns [`AudioPipeError::ZeroCapacity`] if `capacity` is zero; a
    /// zero-capacity queue could never accept a push and would deadlock its
    /// first producer.
    pub fn new(capacity: usize) -> Result<Self, AudioPipeError> {
        if capacity == 0 {
            return Err(AudioPipeError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity),
                quitting: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        })
    }

    /// Appends a chunk, blocking while the queue is full.
    ///
    /// If the queue is quitting, the chunk is silently discarded - there is
    /// no consumer left that could observe it.
    pub fn push(&self, chunk: Chunk) {
        let mut inner = self.inner.lock();
        while inner.items.len() == self.capacity && !inner.quitting {
            self.not_full.wait(&mut inner);
        }
        if inner.quitting {
            return;
        }
        inner.items.push_back(chunk);
        self.not_empty.notify_one();
    }

    /// Appends a chunk only if space is available right now.
    ///
    /// Never blocks, so it is safe to call from a real-time audio callback.
    /// Returns `true` if the chunk was enqueued. A `false` return means the
    /// queue was full (overflow) or quitting; check
    /// [`is_quitting`](ChunkQueue::is_quitting) to tell the two apart.
    pub fn try_push(&self, chunk: Chunk) -> bool {
        let mut inner = self.inner.lock();
        if inner.quitting || inner.items.len() == self.capacity {
            return false;
        }
        inner.items.push_back(chunk);
        self.not_empty.notify_one();
        true
    }

    /// Removes and returns the head chunk, blocking while the queue is empty.
    ///
    /// Returns `None` only once the queue is quitting *and* fully drained:
    /// chunks enqueued before `quit()` are still delivered in order.
    pub fn pop(&self) -> Option<Chunk> {
        let mut inner = self.inner.lock();
        while inner.items.is_empty() && !inner.quitting {
            self.not_empty.wait(&mut inner);
        }
        match inner.items.pop_front() {
            Some(chunk) => {
                self.not_full.notify_one();
                Some(chunk)
            }
            None => None,
        }
    }

    /// Removes and returns the head chunk if one is available right now.
    ///
    /// Never blocks. `None` means "nothing queued at this instant", which
    /// may be a transient underrun or end-of-stream - check
    /// [`is_finished`](ChunkQueue::is_finished) to distinguish.
    pub fn try_pop(&self) -> Option<Chunk> {
        let mut inner = self.inner.lock();
        let chunk = inner.items.pop_front()?;
        self.not_full.notify_one();
        Some(chunk)
    }

    /// Signals that no further chunks will be pushed.
    ///
    /// Wakes all blocked producers and consumers. Idempotent - calling it
    /// again has no additional effect. Already-queued chunks remain
    /// consumable via [`pop`](ChunkQueue::pop).
    pub fn quit(&self) {
        let mut inner = self.inner.lock();
        if inner.quitting {
            return;
        }
        inner.quitting = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Returns the number of chunks currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Returns `true` if no chunks are currently queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Returns the fixed capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` once [`quit`](ChunkQueue::quit) has been called.
    pub fn is_quitting(&self) -> bool {
        self.inner.lock().quitting
    }

    /// Returns `true` once the queue is quitting and fully drained.
    pub fn is_finished(&self) -> bool {
        let inner = self.inner.lock();
        inner.quitting && inner.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn chunk(byte: u8, len: usize) -> Chunk {
        Chunk::from_vec(vec![byte; len], Duration::ZERO)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            ChunkQueue::new(0),
            Err(AudioPipeError::ZeroCapacity)
        ));
    }

    #[test]
    fn test_fifo_order() {
        let queue = ChunkQueue::new(8).unwrap();
        for i in 0..5u8 {
            queue.push(chunk(i, 4));
        }
        for i in 0..5u8 {
            let popped = queue.pop().unwrap();
            assert_eq!(popped.bytes()[0], i);
        }
    }

    #[test]
    fn test_push_blocks_at_capacity() {
        let queue = Arc::new(ChunkQueue::new(2).unwrap());
        queue.push(chunk(1, 4));
        queue.push(chunk(2, 4));
        assert_eq!(queue.len(), 2);

        let producer = {
            let queue = queue.clone();
            std::thread::spawn(move || {
                // Blocks until the main thread pops.
                queue.push(chunk(3, 4));
            })
        };

        // Give the producer a moment to park on the full queue.
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop().unwrap().bytes()[0], 1);
        producer.join().unwrap();

        assert_eq!(queue.pop().unwrap().bytes()[0], 2);
        assert_eq!(queue.pop().unwrap().bytes()[0], 3);
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(ChunkQueue::new(2).unwrap());
        let consumer = {
            let queue = queue.clone();
            std::thread::spawn(move || queue.pop())
        };

        std::thread::sleep(Duration::from_millis(50));
        queue.push(chunk(7, 4));

        let popped = consumer.join().unwrap().unwrap();
        assert_eq!(popped.bytes()[0], 7);
    }

    #[test]
    fn test_try_push_overflow() {
        let queue = ChunkQueue::new(1).unwrap();
        assert!(queue.try_push(chunk(1, 4)));
        assert!(!queue.try_push(chunk(2, 4)));
        assert_eq!(queue.len(), 1);
        assert!(!queue.is_quitting());
    }

    #[test]
    fn test_quit_drains_backlog() {
        let queue = ChunkQueue::new(8).unwrap();
        for i in 0..5u8 {
            queue.push(chunk(i, 4));
        }
        queue.quit();

        // All five pre-quit chunks still come out, in order.
        for i in 0..5u8 {
            assert_eq!(queue.pop().unwrap().bytes()[0], i);
        }
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_push_after_quit_is_noop() {
        let queue = ChunkQueue::new(8).unwrap();
        queue.push(chunk(1, 4));
        queue.quit();
        queue.push(chunk(2, 4));
        assert!(!queue.try_push(chunk(3, 4)));

        assert_eq!(queue.pop().unwrap().bytes()[0], 1);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_quit_is_idempotent() {
        let queue = ChunkQueue::new(2).unwrap();
        queue.push(chunk(1, 4));
        queue.quit();
        queue.quit();
        queue.quit();
        assert_eq!(queue.pop().unwrap().bytes()[0], 1);
        assert!(queue.pop().is_none());
        assert!(queue.is_finished());
    }

    #[test]
    fn test_quit_wakes_blocked_pop() {
        let queue = Arc::new(ChunkQueue::new(2).unwrap());
        let consumer = {
            let queue = queue.clone();
            std::thread::spawn(move || queue.pop())
        };

        std::thread::sleep(Duration::from_millis(50));
        queue.quit();

        assert!(consumer.join().unwrap().is_none());
    }

    #[test]
    fn test_quit_wakes_blocked_push() {
        let queue = Arc::new(ChunkQueue::new(1).unwrap());
        queue.push(chunk(1, 4));

        let producer = {
            let queue = queue.clone();
            std::thread::spawn(move || {
                // Parked on the full queue; quit must release it.
                queue.push(chunk(2, 4));
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        queue.quit();
        producer.join().unwrap();

        // The post-quit push was discarded.
        assert_eq!(queue.pop().unwrap().bytes()[0], 1);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_quit_wakes_all_waiters() {
        let queue = Arc::new(ChunkQueue::new(1).unwrap());
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                std::thread::spawn(move || queue.pop())
            })
            .collect();

        std::thread::sleep(Duration::from_millis(50));
        queue.quit();

        for consumer in consumers {
            assert!(consumer.join().unwrap().is_none());
        }
    }

    #[test]
    fn test_concurrent_producer_consumer_preserves_bytes() {
        let queue = Arc::new(ChunkQueue::new(4).unwrap());
        let total_chunks = 200u8;

        let producer = {
            let queue = queue.clone();
            std::thread::spawn(move || {
                for i in 0..total_chunks {
                    queue.push(chunk(i, 8));
                }
                queue.quit();
            })
        };

        let mut seen = Vec::new();
        while let Some(popped) = queue.pop() {
            seen.push(popped.bytes()[0]);
        }
        producer.join().unwrap();

        let expected: Vec<u8> = (0..total_chunks).collect();
        assert_eq!(seen, expected);
    }
}
