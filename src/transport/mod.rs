//! Chunk transport between the hardware boundary and byte-level consumers.
//!
//! Two pieces, layered:
//!
//! - [`ChunkQueue`]: bounded, blocking, quittable FIFO of chunks - the
//!   concurrency boundary.
//! - [`ChunkCursor`]: single-owner adapter that turns chunk-granular queue
//!   access into byte-granular stream access.

mod cursor;
mod queue;

pub use cursor::{ChunkCursor, DrainWaiter, ReadOutcome};
pub use queue::ChunkQueue;
