//! Pluggable output backend.
//!
//! The engine only talks to [`AudioBackend`]. Callbacks are boxed closures so
//! the trait stays object-safe and the backend can be picked at runtime, which
//! is what lets the engine swap a failed hardware stream for a
//! [`NullBackend`](crate::NullBackend) without touching the renderer.
//!
//! ```text
//! Engine ──► AudioBackend ──┬── CpalBackend  (ALSA, CoreAudio, WASAPI)
//!                           └── NullBackend  (timer thread, silent)
//! ```

use crate::Result;

/// Audio device information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Whether the device supports audio output.
    pub is_output: bool,
    /// Whether the device supports audio input.
    pub is_input: bool,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
}

/// Requested stream parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStreamConfig {
    /// Requested sample rate in Hz.
    pub sample_rate: u32,
    /// Fixed buffer size in frames.
    pub buffer_size: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Device name filter (case-insensitive substring). System default if `None`.
    pub device_name: Option<String>,
}

impl Default for BackendStreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            buffer_size: 256,
            channels: 2,
            device_name: None,
        }
    }
}

/// Type-erased running stream. Dropping it stops playback.
pub struct StreamHandle {
    _inner: Box<dyn Send>,
}

impl StreamHandle {
    /// Keep `stream` alive until the handle is dropped.
    pub fn new<T: Send + 'static>(stream: T) -> Self {
        Self {
            _inner: Box::new(stream),
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle").finish_non_exhaustive()
    }
}

/// Output callback, run on the audio thread.
///
/// Receives `buffer_size * channels` interleaved samples (`[L0, R0, L1, ...]`)
/// to fill. Must not block, lock or allocate.
pub type OutputCallback = Box<dyn FnMut(&mut [f32]) + Send>;

/// Called with a message when the stream fails while running.
pub type ErrorCallback = Box<dyn FnMut(&str) + Send>;

/// Platform output API.
pub trait AudioBackend: Send {
    /// Short backend name ("cpal", "null").
    fn name(&self) -> &str;

    /// All devices this backend can see.
    fn list_devices(&self) -> Result<Vec<AudioDevice>>;

    /// The system default output device, if any.
    fn default_output_device(&self) -> Result<Option<AudioDevice>>;

    /// Open and start an output stream.
    ///
    /// A named device that matches nothing yields
    /// [`Error::DeviceNotFound`](crate::Error::DeviceNotFound), a missing
    /// default device [`Error::NoDevice`](crate::Error::NoDevice). Failing
    /// to open or start the device yields
    /// [`Error::DeviceUnavailable`](crate::Error::DeviceUnavailable).
    fn build_output_stream(
        &self,
        config: &BackendStreamConfig,
        callback: OutputCallback,
        error_callback: ErrorCallback,
    ) -> Result<StreamHandle>;

    /// The rate the device will actually run at for `config`.
    fn actual_sample_rate(&self, config: &BackendStreamConfig) -> u32 {
        config.sample_rate
    }
}
