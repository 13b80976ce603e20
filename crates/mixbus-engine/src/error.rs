//! Engine error types.

use mixbus_config::ConfigError;
use mixbus_core::{ChannelId, GraphError, TrackError, TrackId, TransportError};
use mixbus_registry::LoadError;
use thiserror::Error;

/// Errors returned by [`Engine`](crate::Engine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Routing or channel edit rejected by the graph.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Transport edit rejected.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Clip edit rejected by the lane.
    #[error(transparent)]
    Track(#[from] TrackError),

    /// An instrument could not be built.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// No track with this id.
    #[error("{0} not found")]
    TrackNotFound(TrackId),

    /// No clip at this position.
    #[error("{track} has no clip {index} on lane {lane}")]
    ClipNotFound {
        /// Track.
        track: TrackId,
        /// Lane index.
        lane: usize,
        /// Clip index.
        index: usize,
    },

    /// The effect kind has no parameter with this `string_id`.
    #[error("effect '{effect}' has no parameter '{param}'")]
    UnknownParameter {
        /// Effect kind.
        effect: String,
        /// Requested `string_id`.
        param: String,
    },

    /// Channel capacity reached.
    #[error("channel limit of {0} reached")]
    TooManyChannels(usize),

    /// Track capacity reached.
    #[error("track limit of {0} reached")]
    TooManyTracks(usize),

    /// The channel's effect chain is full.
    #[error("effect chain on {0} is full")]
    ChainFull(ChannelId),

    /// The audio thread is not draining commands fast enough.
    #[error("command queue is full")]
    QueueFull,

    /// The operation needs the output stopped.
    #[error("engine is running")]
    Running,

    /// The renderer did not come back when its stream was dropped.
    #[error("renderer was not returned by the audio stream")]
    RendererLost,

    /// Device or file I/O failure.
    #[error(transparent)]
    Audio(#[from] mixbus_io::Error),

    /// Project could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use mixbus_core::CycleError;

    #[test]
    fn test_cycle_message_passes_through() {
        let err: EngineError = GraphError::Cycle(CycleError {
            from: ChannelId::MASTER,
            to: ChannelId(1),
        })
        .into();
        assert_eq!(err.to_string(), "send ch0 -> ch1 would create a feedback loop");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            EngineError::ClipNotFound {
                track: TrackId(2),
                lane: 1,
                index: 4
            }
            .to_string(),
            "track2 has no clip 4 on lane 1"
        );
        assert_eq!(
            EngineError::TooManyChannels(64).to_string(),
            "channel limit of 64 reached"
        );
    }
}
