//! Error types for configuration operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading, saving or converting projects and settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Unknown effect type
    #[error("unknown effect type: {0}")]
    UnknownEffect(String),

    /// Invalid parameter
    #[error("invalid parameter '{param}' for effect '{effect}': {reason}")]
    InvalidParameter {
        /// Effect type containing the parameter.
        effect: String,
        /// Parameter key.
        param: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Validation errors
    #[error("validation failed: {0}")]
    Validation(#[from] crate::validation::ValidationError),

    /// An audio clip's file could not be loaded.
    #[error("failed to load audio '{path}': {source}")]
    Audio {
        /// Resolved path of the audio file.
        path: PathBuf,
        /// Underlying WAV error.
        #[source]
        source: mixbus_io::Error,
    },
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a create directory error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// Create an audio load error.
    pub fn audio(path: impl Into<PathBuf>, source: mixbus_io::Error) -> Self {
        ConfigError::Audio {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn mock_io_err() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, "mock")
    }

    #[test]
    fn read_file_display_and_source() {
        let err = ConfigError::read_file("/a/b.toml", mock_io_err());
        let msg = err.to_string();
        assert!(msg.contains("failed to read file"), "got: {msg}");
        assert!(msg.contains("/a/b.toml"), "got: {msg}");
        assert!(err.source().is_some());
    }

    #[test]
    fn create_dir_factory_produces_correct_variant() {
        let err = ConfigError::create_dir("/dir/path", mock_io_err());
        assert!(
            matches!(err, ConfigError::CreateDir { ref path, .. } if path == std::path::Path::new("/dir/path"))
        );
    }

    #[test]
    fn audio_error_exposes_wav_source() {
        let err = ConfigError::audio("kick.wav", mixbus_io::Error::NoDevice);
        assert!(err.to_string().contains("kick.wav"));
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_parameter_display() {
        let err = ConfigError::InvalidParameter {
            effect: "delay".to_string(),
            param: "time".to_string(),
            reason: "cannot parse 'soon'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid parameter 'time' for effect 'delay': cannot parse 'soon'"
        );
        assert!(err.source().is_none());
    }
}
