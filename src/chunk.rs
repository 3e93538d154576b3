//! Audio data chunk - the unit of transport.

use std::sync::Arc;
use std::time::Duration;

use crate::AudioPipeError;

/// An immutable, timestamped byte buffer.
///
/// `Chunk` is the fundamental unit passed through the transport. The payload
/// is opaque to the pipeline - it carries whatever PCM encoding the stream
/// was opened with, and is never inspected or converted in transit.
///
/// Bytes are stored in an `Arc<Vec<u8>>` so a chunk can be shared between
/// the producer that created it and the queue/cursor holding it without
/// copying. A chunk is never mutated after construction.
///
/// A zero-length chunk is legal: it marks "no data available right now"
/// without ending the stream, and is skipped transparently by cursors.
///
/// # Example
///
/// ```
/// use audiopipe::Chunk;
/// use std::time::Duration;
///
/// let chunk = Chunk::copy_from(&[1, 2, 3, 4], Duration::from_millis(20)).unwrap();
/// assert_eq!(chunk.len(), 4);
///
/// let shared = chunk.clone(); // cheap - shares the payload
/// assert_eq!(shared.bytes(), chunk.bytes());
/// ```
#[derive(Debug, Clone)]
pub struct Chunk {
    bytes: Arc<Vec<u8>>,
    timestamp: Duration,
}

impl Chunk {
    /// Creates a chunk by copying the given bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AudioPipeError::AllocationFailed`] if storage for the copy
    /// cannot be obtained. The failure is local to this call.
    pub fn copy_from(bytes: &[u8], timestamp: Duration) -> Result<Self, AudioPipeError> {
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(bytes.len())
            .map_err(|_| AudioPipeError::AllocationFailed {
                requested: bytes.len(),
            })?;
        storage.extend_from_slice(bytes);
        Ok(Self::from_vec(storage, timestamp))
    }

    /// Creates a chunk from an already-owned buffer, without copying.
    pub fn from_vec(bytes: Vec<u8>, timestamp: Duration) -> Self {
        Self {
            bytes: Arc::new(bytes),
            timestamp,
        }
    }

    /// Creates a zero-length chunk.
    ///
    /// Distinct from end-of-stream: it signals "no data currently available"
    /// while leaving the stream open.
    pub fn empty(timestamp: Duration) -> Self {
        Self::from_vec(Vec::new(), timestamp)
    }

    /// Returns the payload.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if this chunk carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the capture/submission time, relative to stream start.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }
}
