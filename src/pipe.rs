//! Duplex audio pipe: CPAL streams on one side, async byte requests on the
//! other.
//!
//! The hardware boundary and the request side never meet directly - each
//! direction owns a [`ChunkQueue`]:
//!
//! - Capture: the device callback converts its sample slice to bytes and
//!   offers it to the input queue without blocking; `read()` drains the
//!   input cursor on a blocking worker.
//! - Playback: `write()` pushes chunks with backpressure; the device
//!   callback drains the output cursor and fills silence once the stream
//!   ends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use parking_lot::Mutex;

use crate::device;
use crate::transport::{ChunkCursor, ChunkQueue, DrainWaiter};
use crate::{AudioPipeError, Chunk, SampleFormat, StreamOptions};

/// Bridges cpal's typed sample slices and the byte-oriented transport.
trait PcmSample: cpal::SizedSample + Send + 'static {
    /// Width of one sample in bytes.
    const BYTES: usize;
    fn write_ne(self, out: &mut Vec<u8>);
    fn read_ne(bytes: &[u8]) -> Self;
}

impl PcmSample for i8 {
    const BYTES: usize = 1;
    fn write_ne(self, out: &mut Vec<u8>) {
        out.push(self as u8);
    }
    fn read_ne(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }
}

impl PcmSample for i16 {
    const BYTES: usize = 2;
    fn write_ne(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_ne_bytes());
    }
    fn read_ne(bytes: &[u8]) -> Self {
        Self::from_ne_bytes([bytes[0], bytes[1]])
    }
}

impl PcmSample for i32 {
    const BYTES: usize = 4;
    fn write_ne(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_ne_bytes());
    }
    fn read_ne(bytes: &[u8]) -> Self {
        Self::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl PcmSample for f32 {
    const BYTES: usize = 4;
    fn write_ne(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_ne_bytes());
    }
    fn read_ne(bytes: &[u8]) -> Self {
        Self::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

/// Result of [`AudioPipe::read`].
#[derive(Debug, Clone)]
pub struct ReadChunk {
    /// The bytes read, at most the requested count.
    pub bytes: Vec<u8>,
    /// `true` once the input stream is closed and fully drained.
    pub finished: bool,
    /// Capture time (relative to stream start) of the chunk that supplied
    /// the first byte, or `None` if no bytes were available.
    pub timestamp: Option<Duration>,
}

/// How [`AudioPipe::quit`] treats audio still queued for playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Wait until queued output has been fully drained to the device.
    Wait,
    /// Stop immediately; undelivered output is discarded with the streams.
    Abort,
}

/// Options for constructing an [`AudioPipe`].
///
/// At least one direction must be configured.
#[derive(Debug, Clone, Default)]
pub struct PipeOptions {
    /// Capture-side options, if the pipe should record.
    pub input: Option<StreamOptions>,
    /// Playback-side options, if the pipe should play.
    pub output: Option<StreamOptions>,
}

impl PipeOptions {
    /// Options for a capture-only pipe.
    pub fn input(options: StreamOptions) -> Self {
        Self {
            input: Some(options),
            output: None,
        }
    }

    /// Options for a playback-only pipe.
    pub fn output(options: StreamOptions) -> Self {
        Self {
            input: None,
            output: Some(options),
        }
    }

    /// Options for a full-duplex pipe.
    pub fn duplex(input: StreamOptions, output: StreamOptions) -> Self {
        Self {
            input: Some(input),
            output: Some(output),
        }
    }
}

struct InputHalf {
    options: StreamOptions,
    queue: Arc<ChunkQueue>,
    /// Shared with read workers; the lock serializes byte-level reads.
    cursor: Arc<Mutex<ChunkCursor>>,
    overflows: Arc<AtomicU64>,
    stream: Option<cpal::Stream>,
}

struct OutputHalf {
    options: StreamOptions,
    queue: Arc<ChunkQueue>,
    /// Moved into the playback callback at start().
    cursor: Option<ChunkCursor>,
    drain_waiter: DrainWaiter,
    stream: Option<cpal::Stream>,
}

/// A duplex audio stream handle.
///
/// Construct with [`PipeOptions`], call [`start`](AudioPipe::start) to open
/// the device(s), then drive it with [`read`](AudioPipe::read) /
/// [`write`](AudioPipe::write) and finish with [`quit`](AudioPipe::quit).
///
/// # Example
///
/// ```ignore
/// use audiopipe::{AudioPipe, PipeOptions, StopMode, StreamOptions};
///
/// let mut pipe = AudioPipe::new(PipeOptions::input(StreamOptions::default()))?;
/// pipe.start()?;
///
/// loop {
///     let chunk = pipe.read(4096).await?;
///     process(&chunk.bytes);
///     if chunk.finished {
///         break;
///     }
/// }
///
/// pipe.quit(StopMode::Wait).await?;
/// ```
pub struct AudioPipe {
    input: Option<InputHalf>,
    output: Option<OutputHalf>,
    epoch: Instant,
}

impl AudioPipe {
    /// Creates a pipe from the given options, without touching hardware.
    ///
    /// # Errors
    ///
    /// Returns [`AudioPipeError::NoDirections`] if neither side is
    /// configured, or [`AudioPipeError::ZeroCapacity`] if a side requests a
    /// zero-length queue.
    pub fn new(options: PipeOptions) -> Result<Self, AudioPipeError> {
        if options.input.is_none() && options.output.is_none() {
            return Err(AudioPipeError::NoDirections);
        }

        let input = options
            .input
            .map(|opts| -> Result<InputHalf, AudioPipeError> {
                let queue = Arc::new(ChunkQueue::new(opts.max_queue)?);
                Ok(InputHalf {
                    cursor: Arc::new(Mutex::new(ChunkCursor::new(queue.clone()))),
                    queue,
                    overflows: Arc::new(AtomicU64::new(0)),
                    stream: None,
                    options: opts,
                })
            })
            .transpose()?;

        let output = options
            .output
            .map(|opts| -> Result<OutputHalf, AudioPipeError> {
                let queue = Arc::new(ChunkQueue::new(opts.max_queue)?);
                let cursor = ChunkCursor::new(queue.clone());
                let drain_waiter = cursor.drain_waiter();
                Ok(OutputHalf {
                    queue,
                    cursor: Some(cursor),
                    drain_waiter,
                    stream: None,
                    options: opts,
                })
            })
            .transpose()?;

        Ok(Self {
            input,
            output,
            epoch: Instant::now(),
        })
    }

    /// Opens the configured device(s) and begins the hardware callbacks.
    ///
    /// # Errors
    ///
    /// Returns an error if a device cannot be found or a stream cannot be
    /// built in the requested format.
    pub fn start(&mut self) -> Result<(), AudioPipeError> {
        self.epoch = Instant::now();
        let on_error = ErrorAction::for_pipe(self.input.as_ref(), self.output.as_ref());

        if let Some(input) = &mut self.input {
            if input.stream.is_none() {
                let stream = build_capture_stream(input, self.epoch, on_error.clone())?;
                stream
                    .play()
                    .map_err(|e| AudioPipeError::BackendError(e.to_string()))?;
                input.stream = Some(stream);
            }
        }

        if let Some(output) = &mut self.output {
            if output.stream.is_none() {
                if let Some(cursor) = output.cursor.take() {
                    let stream =
                        build_playback_stream(&output.options, cursor, on_error.clone())?;
                    stream
                        .play()
                        .map_err(|e| AudioPipeError::BackendError(e.to_string()))?;
                    output.stream = Some(stream);
                }
            }
        }

        Ok(())
    }

    /// Reads up to `max_bytes` captured bytes.
    ///
    /// Blocks (on a worker thread) until the full count is available or the
    /// input stream ends; the result reports fewer bytes only together with
    /// `finished`. Concurrent reads are serialized.
    ///
    /// # Errors
    ///
    /// Returns [`AudioPipeError::NotReadable`] on an output-only pipe.
    pub async fn read(&self, max_bytes: usize) -> Result<ReadChunk, AudioPipeError> {
        let input = self.input.as_ref().ok_or(AudioPipeError::NotReadable)?;
        let cursor = input.cursor.clone();

        tokio::task::spawn_blocking(move || {
            let mut buf = Vec::new();
            buf.try_reserve_exact(max_bytes)
                .map_err(|_| AudioPipeError::AllocationFailed {
                    requested: max_bytes,
                })?;
            buf.resize(max_bytes, 0);

            let mut cursor = cursor.lock();
            let outcome = cursor.read(&mut buf);
            buf.truncate(outcome.bytes);
            Ok(ReadChunk {
                bytes: buf,
                finished: outcome.finished,
                timestamp: outcome.timestamp,
            })
        })
        .await
        .map_err(|e| AudioPipeError::BackendError(format!("read worker failed: {e}")))?
    }

    /// Queues bytes for playback.
    ///
    /// Copies `bytes` into a chunk and pushes it to the output queue; the
    /// future resolves once the chunk is queued, so a full queue exerts
    /// backpressure on the writer. After [`quit`](AudioPipe::quit) the data
    /// is silently discarded.
    ///
    /// # Errors
    ///
    /// Returns [`AudioPipeError::NotWritable`] on an input-only pipe.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), AudioPipeError> {
        let output = self.output.as_ref().ok_or(AudioPipeError::NotWritable)?;
        let chunk = Chunk::copy_from(bytes, self.epoch.elapsed())?;
        let queue = output.queue.clone();

        tokio::task::spawn_blocking(move || queue.push(chunk))
            .await
            .map_err(|e| AudioPipeError::BackendError(format!("write worker failed: {e}")))
    }

    /// Shuts the pipe down.
    ///
    /// Closes both queues, so blocked reads finish draining captured audio
    /// and then report `finished`, and further writes are discarded. With
    /// [`StopMode::Wait`], blocks until already-queued playback has been
    /// fully delivered to the device before the streams are released.
    ///
    /// Safe to call more than once.
    pub async fn quit(&mut self, mode: StopMode) -> Result<(), AudioPipeError> {
        if let Some(input) = &self.input {
            input.queue.quit();
        }
        if let Some(output) = &self.output {
            output.queue.quit();
            if mode == StopMode::Wait && output.stream.is_some() {
                let waiter = output.drain_waiter.clone();
                tokio::task::spawn_blocking(move || waiter.wait())
                    .await
                    .map_err(|e| {
                        AudioPipeError::BackendError(format!("drain wait failed: {e}"))
                    })?;
            }
        }

        tracing::debug!(?mode, "audio pipe quit");

        // Dropping the streams stops the hardware callbacks.
        if let Some(input) = &mut self.input {
            input.stream = None;
        }
        if let Some(output) = &mut self.output {
            output.stream = None;
        }
        Ok(())
    }

    /// Returns how many capture chunks were dropped because the input queue
    /// was full. Zero on pipes without an input side.
    pub fn capture_overflows(&self) -> u64 {
        self.input
            .as_ref()
            .map(|input| input.overflows.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

/// What the cpal error callback does, shared by both stream directions.
///
/// Holds the queues of the sides whose options request `close_on_error`;
/// each side opts in or out independently.
#[derive(Clone)]
struct ErrorAction {
    queues: Vec<Arc<ChunkQueue>>,
}

impl ErrorAction {
    fn for_pipe(input: Option<&InputHalf>, output: Option<&OutputHalf>) -> Self {
        let mut queues = Vec::new();
        if let Some(half) = input {
            if half.options.close_on_error {
                queues.push(half.queue.clone());
            }
        }
        if let Some(half) = output {
            if half.options.close_on_error {
                queues.push(half.queue.clone());
            }
        }
        Self { queues }
    }

    fn into_callback(self) -> impl FnMut(cpal::StreamError) {
        move |err| {
            tracing::error!("audio stream error: {err}");
            // Unblocks any parked reader/writer with end-of-stream.
            for queue in &self.queues {
                queue.quit();
            }
        }
    }
}

fn stream_config(options: &StreamOptions) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels: options.channels,
        sample_rate: cpal::SampleRate(options.sample_rate),
        buffer_size: options
            .frames_per_buffer
            .map(cpal::BufferSize::Fixed)
            .unwrap_or(cpal::BufferSize::Default),
    }
}

fn build_capture_stream(
    input: &InputHalf,
    epoch: Instant,
    on_error: ErrorAction,
) -> Result<cpal::Stream, AudioPipeError> {
    let device = device::open_input_device(&input.options.device)?;
    tracing::info!(
        device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
        options = %input.options,
        "opening capture stream"
    );

    let config = stream_config(&input.options);
    let queue = input.queue.clone();
    let overflows = input.overflows.clone();
    match input.options.sample_format {
        SampleFormat::Int8 => build_capture::<i8>(&device, &config, queue, overflows, epoch, on_error),
        SampleFormat::Int16 => build_capture::<i16>(&device, &config, queue, overflows, epoch, on_error),
        SampleFormat::Int32 => build_capture::<i32>(&device, &config, queue, overflows, epoch, on_error),
        SampleFormat::Float32 => build_capture::<f32>(&device, &config, queue, overflows, epoch, on_error),
    }
}

fn build_capture<T: PcmSample>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: Arc<ChunkQueue>,
    overflows: Arc<AtomicU64>,
    epoch: Instant,
    on_error: ErrorAction,
) -> Result<cpal::Stream, AudioPipeError> {
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut bytes = Vec::new();
                if bytes.try_reserve_exact(data.len() * T::BYTES).is_err() {
                    // Allocation pressure: drop this buffer rather than
                    // stall the audio thread.
                    return;
                }
                for &sample in data {
                    sample.write_ne(&mut bytes);
                }
                let chunk = Chunk::from_vec(bytes, epoch.elapsed());
                // Best-effort push: never block the hardware callback.
                if !queue.try_push(chunk) && !queue.is_quitting() {
                    let dropped = overflows.fetch_add(1, Ordering::Relaxed) + 1;
                    if dropped == 1 || dropped % 100 == 0 {
                        tracing::warn!(dropped, "capture queue full - dropping audio chunk");
                    }
                }
            },
            on_error.into_callback(),
            None,
        )
        .map_err(|e| AudioPipeError::BackendError(e.to_string()))
}

fn build_playback_stream(
    options: &StreamOptions,
    cursor: ChunkCursor,
    on_error: ErrorAction,
) -> Result<cpal::Stream, AudioPipeError> {
    let device = device::open_output_device(&options.device)?;
    tracing::info!(
        device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
        options = %options,
        "opening playback stream"
    );

    let config = stream_config(options);
    match options.sample_format {
        SampleFormat::Int8 => build_playback::<i8>(&device, &config, cursor, on_error),
        SampleFormat::Int16 => build_playback::<i16>(&device, &config, cursor, on_error),
        SampleFormat::Int32 => build_playback::<i32>(&device, &config, cursor, on_error),
        SampleFormat::Float32 => build_playback::<f32>(&device, &config, cursor, on_error),
    }
}

fn build_playback<T: PcmSample>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut cursor: ChunkCursor,
    on_error: ErrorAction,
) -> Result<cpal::Stream, AudioPipeError> {
    let mut scratch: Vec<u8> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let byte_len = data.len() * T::BYTES;
                scratch.resize(byte_len, 0);
                // Blocks until the writer supplies data or quit() fires;
                // after end-of-stream the shortfall plays as silence.
                let outcome = cursor.drain(&mut scratch[..byte_len]);
                scratch[outcome.bytes..byte_len].fill(0);
                for (i, slot) in data.iter_mut().enumerate() {
                    *slot = T::read_ne(&scratch[i * T::BYTES..(i + 1) * T::BYTES]);
                }
            },
            on_error.into_callback(),
            None,
        )
        .map_err(|e| AudioPipeError::BackendError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeviceSelection;

    fn small_options(max_queue: usize) -> StreamOptions {
        StreamOptions {
            device: DeviceSelection::SystemDefault,
            max_queue,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_directions_rejected() {
        assert!(matches!(
            AudioPipe::new(PipeOptions::default()),
            Err(AudioPipeError::NoDirections)
        ));
    }

    #[test]
    fn test_zero_queue_rejected_at_construction() {
        assert!(matches!(
            AudioPipe::new(PipeOptions::input(small_options(0))),
            Err(AudioPipeError::ZeroCapacity)
        ));
    }

    #[tokio::test]
    async fn test_read_on_output_only_pipe() {
        let pipe = AudioPipe::new(PipeOptions::output(small_options(2))).unwrap();
        assert!(matches!(
            pipe.read(16).await,
            Err(AudioPipeError::NotReadable)
        ));
    }

    #[tokio::test]
    async fn test_write_on_input_only_pipe() {
        let pipe = AudioPipe::new(PipeOptions::input(small_options(2))).unwrap();
        assert!(matches!(
            pipe.write(&[0; 16]).await,
            Err(AudioPipeError::NotWritable)
        ));
    }

    #[tokio::test]
    async fn test_read_drains_captured_chunks() {
        let pipe = AudioPipe::new(PipeOptions::input(small_options(4))).unwrap();
        let queue = pipe.input.as_ref().unwrap().queue.clone();

        queue.push(Chunk::from_vec(vec![1; 6], Duration::from_millis(10)));
        queue.push(Chunk::from_vec(vec![2; 6], Duration::from_millis(20)));
        queue.quit();

        let first = pipe.read(8).await.unwrap();
        assert_eq!(first.bytes, vec![1, 1, 1, 1, 1, 1, 2, 2]);
        assert!(!first.finished);
        assert_eq!(first.timestamp, Some(Duration::from_millis(10)));

        let rest = pipe.read(64).await.unwrap();
        assert_eq!(rest.bytes, vec![2, 2, 2, 2]);
        assert!(rest.finished);
        assert_eq!(rest.timestamp, Some(Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_read_after_finish_reports_empty() {
        let pipe = AudioPipe::new(PipeOptions::input(small_options(2))).unwrap();
        pipe.input.as_ref().unwrap().queue.quit();

        let result = pipe.read(32).await.unwrap();
        assert!(result.bytes.is_empty());
        assert!(result.finished);
        assert_eq!(result.timestamp, None);

        let again = pipe.read(32).await.unwrap();
        assert!(again.bytes.is_empty());
        assert!(again.finished);
    }

    #[tokio::test]
    async fn test_write_queues_chunk() {
        let pipe = AudioPipe::new(PipeOptions::output(small_options(4))).unwrap();
        pipe.write(&[9, 8, 7]).await.unwrap();

        let queue = pipe.output.as_ref().unwrap().queue.clone();
        let chunk = queue.pop().unwrap();
        assert_eq!(chunk.bytes(), &[9, 8, 7]);
    }

    #[tokio::test]
    async fn test_write_backpressure_until_drain() {
        let pipe = AudioPipe::new(PipeOptions::output(small_options(2))).unwrap();
        let queue = pipe.output.as_ref().unwrap().queue.clone();
        pipe.write(&[1]).await.unwrap();
        pipe.write(&[2]).await.unwrap();

        // The third write must stay pending against the full queue.
        let write_fut = pipe.write(&[3]);
        tokio::pin!(write_fut);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), &mut write_fut)
                .await
                .is_err()
        );

        assert_eq!(queue.try_pop().unwrap().bytes(), &[1]);
        write_fut.await.unwrap();

        assert_eq!(queue.try_pop().unwrap().bytes(), &[2]);
        assert_eq!(queue.try_pop().unwrap().bytes(), &[3]);
    }

    #[tokio::test]
    async fn test_quit_discards_later_writes() {
        let mut pipe = AudioPipe::new(PipeOptions::output(small_options(4))).unwrap();
        pipe.write(&[1]).await.unwrap();
        let queue = pipe.output.as_ref().unwrap().queue.clone();

        pipe.quit(StopMode::Abort).await.unwrap();
        pipe.write(&[2]).await.unwrap(); // silently discarded

        assert_eq!(queue.pop().unwrap().bytes(), &[1]);
        assert!(queue.pop().is_none());
    }

    #[tokio::test]
    async fn test_quit_is_idempotent() {
        let mut pipe = AudioPipe::new(PipeOptions::duplex(small_options(2), small_options(2)))
            .unwrap();
        pipe.quit(StopMode::Wait).await.unwrap();
        pipe.quit(StopMode::Wait).await.unwrap();
        pipe.quit(StopMode::Abort).await.unwrap();
    }

    #[tokio::test]
    async fn test_quit_unblocks_pending_read() {
        let pipe = AudioPipe::new(PipeOptions::input(small_options(2))).unwrap();
        let queue = pipe.input.as_ref().unwrap().queue.clone();

        let read_fut = pipe.read(16);
        tokio::pin!(read_fut);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), &mut read_fut)
                .await
                .is_err()
        );

        queue.quit();
        let result = read_fut.await.unwrap();
        assert!(result.finished);
        assert!(result.bytes.is_empty());
    }

    #[test]
    fn test_close_on_error_honors_each_side() {
        let input_options = StreamOptions {
            close_on_error: false,
            ..small_options(2)
        };
        let pipe =
            AudioPipe::new(PipeOptions::duplex(input_options, small_options(2))).unwrap();

        let mut on_error =
            ErrorAction::for_pipe(pipe.input.as_ref(), pipe.output.as_ref()).into_callback();
        on_error(cpal::StreamError::DeviceNotAvailable);

        // Only the output side asked to be closed on a stream error.
        assert!(!pipe.input.as_ref().unwrap().queue.is_quitting());
        assert!(pipe.output.as_ref().unwrap().queue.is_quitting());
    }

    #[test]
    fn test_capture_overflow_counter_starts_at_zero() {
        let pipe = AudioPipe::new(PipeOptions::input(small_options(2))).unwrap();
        assert_eq!(pipe.capture_overflows(), 0);
        let out_only = AudioPipe::new(PipeOptions::output(small_options(2))).unwrap();
        assert_eq!(out_only.capture_overflows(), 0);
    }

    #[test]
    fn test_pcm_sample_round_trips() {
        let mut bytes = Vec::new();
        (-12345i16).write_ne(&mut bytes);
        1.5f32.write_ne(&mut bytes);
        (-7i8).write_ne(&mut bytes);
        0x0102_0304i32.write_ne(&mut bytes);

        assert_eq!(i16::read_ne(&bytes[0..2]), -12345);
        assert_eq!(f32::read_ne(&bytes[2..6]), 1.5);
        assert_eq!(i8::read_ne(&bytes[6..7]), -7);
        assert_eq!(i32::read_ne(&bytes[7..11]), 0x0102_0304);
    }
}
