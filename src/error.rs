//! Error types for audiopipe.
//!
//! End-of-stream is deliberately *not* an error: a drained, closed stream is
//! reported through the `finished` flag on read results. Errors here are
//! either construction-time rejections or backend failures.

/// Errors returned by the audiopipe API.
#[derive(Debug, thiserror::Error)]
pub enum AudioPipeError {
    /// Storage for a chunk copy could not be obtained.
    ///
    /// Fatal to the single read/write that triggered it; the queue and any
    /// cursors remain valid.
    #[error("allocation of {requested} bytes for audio chunk failed")]
    AllocationFailed {
        /// Number of bytes that could not be allocated.
        requested: usize,
    },

    /// A chunk queue was configured with a capacity of zero.
    #[error("chunk queue capacity must be non-zero")]
    ZeroCapacity,

    /// The requested audio device was not found.
    #[error("device not found: {name}")]
    DeviceNotFound {
        /// Name of the device that wasn't found.
        name: String,
    },

    /// No default device is configured for the requested direction.
    #[error("no default {direction} device configured")]
    NoDefaultDevice {
        /// Either "input" or "output".
        direction: &'static str,
    },

    /// The requested sample format cannot be delivered natively.
    #[error("unsupported sample format: {format}")]
    UnsupportedFormat {
        /// The format that wasn't supported.
        format: String,
    },

    /// `read` was called on a pipe with no input side.
    #[error("cannot read from an output-only stream")]
    NotReadable,

    /// `write` was called on a pipe with no output side.
    #[error("cannot write to an input-only stream")]
    NotWritable,

    /// A pipe was configured with neither an input nor an output side.
    #[error("pipe options must include an input and/or an output")]
    NoDirections,

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    BackendError(String),
}
