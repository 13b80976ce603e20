//! Project files, user settings and validation for mixbus.
//!
//! - [`Project`]: the persisted session (channel graph, effects, sends,
//!   tracks, clips, transport) as TOML, convertible to and from the live
//!   [`ChannelGraph`](mixbus_core::ChannelGraph) and tracks.
//! - [`Settings`]: `settings.toml` with a default for every field.
//! - [`validate_project`]: checks a project against an
//!   [`EffectRegistry`](mixbus_registry::EffectRegistry).
//! - [`paths`]: platform config and project directories.
//!
//! ```rust,no_run
//! use mixbus_config::{EffectConfig, Project};
//!
//! let mut project = Project::starter("demo");
//! project.channels[1].effects.push(EffectConfig::new("distortion").with_param("drive", "18dB"));
//! project.save("demo.toml").unwrap();
//!
//! let graph = Project::load("demo.toml").unwrap().to_graph().unwrap();
//! println!("{:?}", graph.render_order());
//! ```

mod effect_config;
mod error;
mod project;
mod settings;

/// Platform-specific paths for settings and projects.
pub mod paths;

/// Project validation.
pub mod validation;

pub use effect_config::{EffectConfig, parse_param_value};
pub use error::ConfigError;
pub use paths::{
    ensure_user_config_dir, find_project, list_user_projects, project_name_from_path,
    settings_path, user_config_dir, user_projects_dir,
};
pub use project::{
    ChannelConfig, ClipConfig, LoopConfig, NoteConfig, Project, SendConfig, TrackConfig,
    TransportConfig,
};
pub use settings::{AfterStop, AudioSettings, EngineSettings, Settings, TransportSettings};
pub use validation::{
    MAX_CHANNEL_ID, MAX_LANES, ValidationError, ValidationResult, validate_effect_config,
    validate_project,
};
