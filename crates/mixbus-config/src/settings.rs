//! User settings (`settings.toml`).
//!
//! ```toml
//! [audio]
//! sample_rate = 48000
//! buffer_size = 256
//! channels = 2
//! device = "USB Audio"
//!
//! [engine]
//! max_channels = 64
//! max_tracks = 256
//! command_queue = 1024
//! after_stop = "go_to_start"
//!
//! [transport]
//! bpm = 120.0
//! ```
//!
//! Every field has a default, so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;

use mixbus_core::StopBehavior;

use crate::error::ConfigError;

/// Where the playhead goes when the transport stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfterStop {
    /// Back to zero, or to the loop start while looping.
    #[default]
    GoToStart,
    /// Stay where playback stopped.
    Hold,
    /// Back to where playback started.
    ReturnToPlayStart,
}

impl From<AfterStop> for StopBehavior {
    fn from(value: AfterStop) -> Self {
        match value {
            AfterStop::GoToStart => StopBehavior::GoToStart,
            AfterStop::Hold => StopBehavior::Hold,
            AfterStop::ReturnToPlayStart => StopBehavior::ReturnToPlayStart,
        }
    }
}

impl From<StopBehavior> for AfterStop {
    fn from(value: StopBehavior) -> Self {
        match value {
            StopBehavior::GoToStart => AfterStop::GoToStart,
            StopBehavior::Hold => AfterStop::Hold,
            StopBehavior::ReturnToPlayStart => AfterStop::ReturnToPlayStart,
        }
    }
}

/// `[audio]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Requested device sample rate in Hz.
    pub sample_rate: u32,
    /// Frames per callback.
    pub buffer_size: u32,
    /// Output channel count.
    pub channels: u16,
    /// Output device name filter. System default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            buffer_size: 256,
            channels: 2,
            device: None,
        }
    }
}

/// `[engine]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Channel strip capacity of the renderer.
    pub max_channels: usize,
    /// Track capacity of the renderer.
    pub max_tracks: usize,
    /// Capacity of the control-to-audio command queue.
    pub command_queue: usize,
    /// After-stop policy for new sessions.
    pub after_stop: AfterStop,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_channels: 64,
            max_tracks: 256,
            command_queue: 1024,
            after_stop: AfterStop::GoToStart,
        }
    }
}

/// `[transport]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Tempo for new projects.
    pub bpm: f32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self { bpm: 120.0 }
    }
}

/// All user settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Device settings.
    pub audio: AudioSettings,
    /// Engine sizing and policy.
    pub engine: EngineSettings,
    /// Transport defaults.
    pub transport: TransportSettings,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load the user's settings file, or defaults if there is none.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = crate::paths::settings_path();
        if path.is_file() {
            tracing::debug!(path = %path.display(), "loading settings");
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse settings from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
    }
}
