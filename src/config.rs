//! Configuration types for audio streams.

use std::fmt;

/// PCM sample formats a stream can be opened with.
///
/// The transport itself is format-agnostic - this only tells the backend
/// which native sample type to request from the device, and therefore how
/// many bytes each sample occupies on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    /// Signed 8-bit integer samples.
    Int8,
    /// Signed 16-bit integer samples.
    #[default]
    Int16,
    /// Signed 32-bit integer samples.
    Int32,
    /// 32-bit float samples in the range -1.0 to +1.0.
    Float32,
}

impl SampleFormat {
    /// Returns the width of one sample in bytes.
    #[must_use]
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int32 | Self::Float32 => 4,
        }
    }

    /// Returns the width of one sample in bits.
    #[must_use]
    pub fn bits(&self) -> u32 {
        self.bytes_per_sample() as u32 * 8
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int8 => write!(f, "8-bit int"),
            Self::Int16 => write!(f, "16-bit int"),
            Self::Int32 => write!(f, "32-bit int"),
            Self::Float32 => write!(f, "32-bit float"),
        }
    }
}

/// Specifies which audio device to use for one direction of a pipe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeviceSelection {
    /// Use the system's default device for the direction.
    #[default]
    SystemDefault,
    /// Use a specific device by name, as reported by
    /// [`list_devices`](crate::list_devices).
    ByName(String),
}

/// Options for one direction (capture or playback) of an audio stream.
///
/// Use [`StreamOptions::default()`] for CD-style defaults, or customize as
/// needed.
///
/// # Example
///
/// ```
/// use audiopipe::{SampleFormat, StreamOptions};
///
/// let options = StreamOptions {
///     sample_rate: 48000,
///     channels: 1,
///     sample_format: SampleFormat::Float32,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Which device to open. Default: the system default device.
    pub device: DeviceSelection,

    /// Sample rate in Hz. Default: 44100.
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo). Default: 2.
    pub channels: u16,

    /// Native sample format to request from the device.
    /// Default: 16-bit int.
    pub sample_format: SampleFormat,

    /// Capacity of the chunk queue, in chunks.
    ///
    /// This bounds how far the hardware side can run ahead of (capture) or
    /// behind (playback) the request side. Must be non-zero. Default: 2.
    pub max_queue: usize,

    /// Preferred frames per hardware buffer, or `None` to let the backend
    /// choose. Default: `None`.
    pub frames_per_buffer: Option<u32>,

    /// Whether a backend stream error closes the pipe's queues, so blocked
    /// readers and writers observe end-of-stream. Default: `true`.
    pub close_on_error: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            device: DeviceSelection::SystemDefault,
            sample_rate: 44100,
            channels: 2,
            sample_format: SampleFormat::Int16,
            max_queue: 2,
            frames_per_buffer: None,
            close_on_error: true,
        }
    }
}

impl fmt::Display for StreamOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "audio options: ")?;
        match &self.device {
            DeviceSelection::SystemDefault => write!(f, "default device, ")?,
            DeviceSelection::ByName(name) => write!(f, "device {name}, ")?,
        }
        write!(
            f,
            "sample rate {}, channels {}, format {}, max queue {}, ",
            self.sample_rate, self.channels, self.sample_format, self.max_queue
        )?;
        match self.frames_per_buffer {
            Some(frames) => write!(f, "frames per buffer {frames}, ")?,
            None => write!(f, "frames per buffer auto, ")?,
        }
        write!(f, "close on error {}", self.close_on_error)
    }
}

impl StreamOptions {
    /// Returns the size of one frame (one sample per channel) in bytes.
    #[must_use]
    pub fn bytes_per_frame(&self) -> usize {
        self.sample_format.bytes_per_sample() * self.channels as usize
    }
}
