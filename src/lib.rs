//! # audiopipe
//!
//! Duplex audio streaming between CPAL devices and async byte-level
//! consumers.
//!
//! `audiopipe` opens capture and/or playback streams and exposes them as a
//! plain byte stream: `read(n)` returns exactly `n` captured bytes (fewer
//! only at end-of-stream) no matter how the hardware sized its buffers, and
//! `write(bytes)` queues playback data with backpressure.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use audiopipe::{AudioPipe, PipeOptions, StopMode, StreamOptions};
//!
//! let mut pipe = AudioPipe::new(PipeOptions::input(StreamOptions::default()))?;
//! pipe.start()?;
//!
//! loop {
//!     let chunk = pipe.read(4096).await?;
//!     // Feed chunk.bytes to an encoder, a socket, a file...
//!     if chunk.finished {
//!         break;
//!     }
//! }
//!
//! pipe.quit(StopMode::Wait).await?;
//! ```
//!
//! ## Architecture
//!
//! Each direction is a bounded chunk queue between two sides that never
//! meet directly:
//!
//! - **Device callback**: produces (capture) or consumes (playback)
//!   timestamped byte chunks on the hardware's own timing
//! - **[`ChunkQueue`]**: fixed-capacity blocking FIFO with a broadcast
//!   close signal
//! - **[`ChunkCursor`]**: converts chunk-granular queue access into the
//!   byte-granular stream the request side sees
//!
//! Shutdown is cooperative: `quit()` closes the queues, blocked calls drain
//! what was already queued and then report end-of-stream, and `StopMode::Wait`
//! holds the playback device open until the last queued byte has been
//! delivered.

#![warn(missing_docs)]
// unwrap/expect are confined to tests
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod chunk;
mod config;
mod device;
mod error;
mod pipe;
mod transport;

pub use chunk::Chunk;
pub use config::{DeviceSelection, SampleFormat, StreamOptions};
pub use device::{
    available_hosts, default_input_device_name, default_output_device_name, list_devices,
    DeviceInfo,
};
pub use error::AudioPipeError;
pub use pipe::{AudioPipe, PipeOptions, ReadChunk, StopMode};
pub use transport::{ChunkCursor, ChunkQueue, DrainWaiter, ReadOutcome};
