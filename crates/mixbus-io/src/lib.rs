//! Audio device backends and WAV file I/O for mixbus.
//!
//! - [`AudioBackend`]: pull-model output streams with interleaved `f32` frames.
//!   [`CpalBackend`] drives real hardware, [`NullBackend`] is a silent device
//!   paced by a timer thread and is the fallback when hardware goes away.
//! - [`read_wav_stereo`] / [`write_wav_stereo`]: stereo WAV through `hound`.
//!
//! ```rust,ignore
//! use mixbus_io::{AudioBackend, BackendStreamConfig, CpalBackend};
//!
//! let backend = CpalBackend::new();
//! let stream = backend.build_output_stream(
//!     &BackendStreamConfig::default(),
//!     Box::new(|data: &mut [f32]| data.fill(0.0)),
//!     Box::new(|err| eprintln!("{err}")),
//! )?;
//! // Plays until `stream` is dropped.
//! ```

pub mod backend;
pub mod cpal_backend;
pub mod null_backend;
mod wav;

pub use backend::{
    AudioBackend, AudioDevice, BackendStreamConfig, ErrorCallback, OutputCallback, StreamHandle,
};
pub use cpal_backend::CpalBackend;
pub use null_backend::NullBackend;
pub use wav::{StereoSamples, WavInfo, WavSpec, read_wav_info, read_wav_stereo, write_wav_stereo};

/// Error types for audio I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Device enumeration or stream runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The output device could not be opened or failed while running.
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The requested sample format is not supported.
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
