//! Project validation against the effect registry.
//!
//! [`validate_project`] collects every problem in a project instead of
//! stopping at the first, so `mixbus check` can report them all.
//!
//! ```rust
//! use mixbus_config::{Project, validate_project};
//! use mixbus_registry::EffectRegistry;
//!
//! let registry = EffectRegistry::new();
//! validate_project(&Project::starter("demo"), &registry).expect("starter is valid");
//! ```

use std::collections::HashSet;

use mixbus_core::{Clip, ClipContent, GraphError, Lane, TrackError, TransportError};
use mixbus_registry::EffectRegistry;
use thiserror::Error;

use crate::effect_config::{EffectConfig, parse_param_value};
use crate::project::Project;

/// Largest channel id a project may use.
pub const MAX_CHANNEL_ID: u32 = 4095;

/// Lanes per track a project may use.
pub const MAX_LANES: usize = 256;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Unknown effect type.
    #[error("unknown effect type: {0}")]
    UnknownEffect(String),

    /// Unknown instrument type.
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    /// Unknown parameter name.
    #[error("unknown parameter '{param}' for effect '{effect}'")]
    UnknownParameter {
        /// Effect type.
        effect: String,
        /// Unrecognized parameter key.
        param: String,
    },

    /// Parameter value out of range.
    #[error("parameter '{param}' value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Parameter key.
        param: String,
        /// Rejected value.
        value: f32,
        /// Minimum allowed value.
        min: f32,
        /// Maximum allowed value.
        max: f32,
    },

    /// Invalid parameter format.
    #[error("invalid format for parameter '{param}': {reason}")]
    InvalidFormat {
        /// Parameter key.
        param: String,
        /// What was wrong.
        reason: String,
    },

    /// A channel id is above [`MAX_CHANNEL_ID`].
    #[error("channel id {0} exceeds {MAX_CHANNEL_ID}")]
    ChannelIdTooLarge(u32),

    /// A clip sits on a lane index at or above [`MAX_LANES`].
    #[error("track '{track}': lane {lane} exceeds the limit of {MAX_LANES} lanes")]
    LaneOutOfRange {
        /// Track name.
        track: String,
        /// Requested lane index.
        lane: usize,
    },

    /// A track routes to a channel that does not exist.
    #[error("track '{track}' routes to missing channel {channel}")]
    UnknownChannel {
        /// Track name.
        track: String,
        /// Missing channel id.
        channel: u32,
    },

    /// The channel graph is invalid.
    #[error("invalid routing: {0}")]
    Routing(GraphError),

    /// Transport settings are invalid.
    #[error("invalid transport: {0}")]
    Transport(TransportError),

    /// A clip cannot be placed.
    #[error("track '{track}': {error}")]
    Clip {
        /// Track name.
        track: String,
        /// Lane error.
        error: TrackError,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Check an effect's type and parameters against the registry.
pub fn validate_effect_config(
    config: &EffectConfig,
    registry: &EffectRegistry,
) -> ValidationResult<()> {
    let mut errors = Vec::new();
    effect_errors(config, registry, &mut errors);
    collect(errors)
}

/// Check a whole project: channels, routing, effects, tracks and transport.
pub fn validate_project(project: &Project, registry: &EffectRegistry) -> ValidationResult<()> {
    let mut errors = Vec::new();

    let mut ids = HashSet::new();
    for channel in &project.channels {
        if channel.id > MAX_CHANNEL_ID {
            errors.push(ValidationError::ChannelIdTooLarge(channel.id));
        }
        ids.insert(channel.id);
        for effect in &channel.effects {
            effect_errors(effect, registry, &mut errors);
        }
    }

    if errors.is_empty()
        && let Err(crate::ConfigError::Validation(e)) = project.to_graph()
    {
        errors.push(e);
    }

    for track in &project.tracks {
        if !ids.contains(&track.channel) {
            errors.push(ValidationError::UnknownChannel {
                track: track.name.clone(),
                channel: track.channel,
            });
        }
        if let Some(instrument) = &track.instrument
            && !registry.contains_instrument(instrument)
        {
            errors.push(ValidationError::UnknownInstrument(instrument.clone()));
        }

        let mut lanes: Vec<Lane> = Vec::new();
        for clip in &track.clips {
            if clip.lane >= MAX_LANES {
                errors.push(ValidationError::LaneOutOfRange {
                    track: track.name.clone(),
                    lane: clip.lane,
                });
                continue;
            }
            while lanes.len() <= clip.lane {
                lanes.push(Lane::new());
            }
            let placed = Clip::new(clip.start_tick, clip.length_ticks, ClipContent::Notes(Vec::new()));
            if let Err(error) = lanes[clip.lane].insert(placed) {
                errors.push(ValidationError::Clip {
                    track: track.name.clone(),
                    error,
                });
            }
        }
    }

    if let Err(crate::ConfigError::Validation(e)) = project.transport.to_transport(48000.0) {
        errors.push(e);
    }

    collect(errors)
}

fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

fn effect_errors(config: &EffectConfig, registry: &EffectRegistry, errors: &mut Vec<ValidationError>) {
    if !registry.contains(&config.effect_type) {
        errors.push(ValidationError::UnknownEffect(config.effect_type.clone()));
        return;
    }
    // a factory that cannot build has no parameters to check against
    let Ok(descriptors) = registry.param_descriptors(&config.effect_type) else {
        return;
    };
    for (key, text) in &config.params {
        let Some(desc) = descriptors.iter().find(|d| d.string_id == key) else {
            errors.push(ValidationError::UnknownParameter {
                effect: config.effect_type.clone(),
                param: key.clone(),
            });
            continue;
        };
        let Some(value) = parse_param_value(text) else {
            errors.push(ValidationError::InvalidFormat {
                param: key.clone(),
                reason: format!("cannot parse '{}' as a number", text),
            });
            continue;
        };
        if value < desc.min || value > desc.max {
            errors.push(ValidationError::OutOfRange {
                param: key.clone(),
                value,
                min: desc.min,
                max: desc.max,
            });
        }
    }
    if !(0.0..=1.0).contains(&config.wet_dry) {
        errors.push(ValidationError::OutOfRange {
            param: "wet_dry".into(),
            value: config.wet_dry,
            min: 0.0,
            max: 1.0,
        });
    }
}
