//! Control messages in and notifications out.

use mixbus_core::{ChannelId, Clip, EffectSettings, LoopRange, StopBehavior, TrackId, TransportState};

/// A change requested by a client through [`Engine::apply`](crate::Engine::apply).
///
/// Commands are validated against the model before anything reaches the
/// audio thread; a rejected command leaves the session unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Add a channel routed to master.
    AddChannel {
        /// Display name.
        name: String,
    },
    /// Remove a channel. Tracks routed to it move to master.
    RemoveChannel(ChannelId),
    /// Rename a channel.
    RenameChannel {
        /// Channel.
        channel: ChannelId,
        /// New name.
        name: String,
    },
    /// Add a send or change its gain.
    AddSend {
        /// Source channel.
        from: ChannelId,
        /// Destination channel.
        to: ChannelId,
        /// Linear gain.
        gain: f32,
    },
    /// Remove a send.
    RemoveSend {
        /// Source channel.
        from: ChannelId,
        /// Destination channel.
        to: ChannelId,
    },
    /// Set channel volume.
    SetVolume {
        /// Channel.
        channel: ChannelId,
        /// Linear gain.
        volume: f32,
    },
    /// Set channel pan.
    SetPan {
        /// Channel.
        channel: ChannelId,
        /// Pan in `[-1, 1]`.
        pan: f32,
    },
    /// Mute or unmute a channel.
    SetMute {
        /// Channel.
        channel: ChannelId,
        /// Muted.
        muted: bool,
    },
    /// Solo or unsolo a channel.
    SetSolo {
        /// Channel.
        channel: ChannelId,
        /// Soloed.
        solo: bool,
    },

    /// Insert an effect. `index: None` appends.
    InsertEffect {
        /// Channel.
        channel: ChannelId,
        /// Chain position.
        index: Option<usize>,
        /// Kind, parameters and slot state.
        effect: EffectSettings,
    },
    /// Remove an effect.
    RemoveEffect {
        /// Channel.
        channel: ChannelId,
        /// Chain position.
        index: usize,
    },
    /// Swap an effect with its predecessor.
    MoveEffectUp {
        /// Channel.
        channel: ChannelId,
        /// Chain position.
        index: usize,
    },
    /// Swap an effect with its successor.
    MoveEffectDown {
        /// Channel.
        channel: ChannelId,
        /// Chain position.
        index: usize,
    },
    /// Set one effect parameter by `string_id`, clamped to its range.
    SetEffectParam {
        /// Channel.
        channel: ChannelId,
        /// Chain position.
        index: usize,
        /// Parameter `string_id`.
        param: String,
        /// Value in the parameter's unit.
        value: f32,
    },
    /// Enable or bypass an effect.
    SetEffectEnabled {
        /// Channel.
        channel: ChannelId,
        /// Chain position.
        index: usize,
        /// Enabled.
        enabled: bool,
    },
    /// Set an effect's wet/dry ratio.
    SetEffectWetDry {
        /// Channel.
        channel: ChannelId,
        /// Chain position.
        index: usize,
        /// Ratio in `[0, 1]`.
        wet_dry: f32,
    },
    /// Configure auto-shutoff.
    SetEffectShutoff {
        /// Channel.
        channel: ChannelId,
        /// Chain position.
        index: usize,
        /// Silence gate in dB.
        gate_db: f32,
        /// Quiet time before sleeping, in ms.
        decay_ms: f32,
        /// Whether the slot may sleep at all.
        auto_shutoff: bool,
    },

    /// Add an empty track.
    AddTrack {
        /// Display name.
        name: String,
        /// Destination channel.
        channel: ChannelId,
        /// Instrument kind for note clips.
        instrument: Option<String>,
    },
    /// Remove a track.
    RemoveTrack(TrackId),
    /// Route a track to another channel.
    RouteTrack {
        /// Track.
        track: TrackId,
        /// Destination channel.
        channel: ChannelId,
    },
    /// Set track gain.
    SetTrackGain {
        /// Track.
        track: TrackId,
        /// Linear gain.
        gain: f32,
    },
    /// Mute or unmute a track.
    SetTrackMute {
        /// Track.
        track: TrackId,
        /// Muted.
        muted: bool,
    },
    /// Replace or clear a track's instrument.
    SetInstrument {
        /// Track.
        track: TrackId,
        /// Instrument kind.
        instrument: Option<String>,
    },
    /// Add a clip. `lane: None` picks the first lane it fits on.
    AddClip {
        /// Track.
        track: TrackId,
        /// Lane index.
        lane: Option<usize>,
        /// Clip.
        clip: Clip,
    },
    /// Remove a clip.
    RemoveClip {
        /// Track.
        track: TrackId,
        /// Lane index.
        lane: usize,
        /// Clip index within the lane.
        index: usize,
    },

    /// Start playback.
    Play,
    /// Stop playback and apply the after-stop policy.
    Stop,
    /// Switch between playing and recording.
    ToggleRecord,
    /// Move the playhead to a frame.
    Seek(u64),
    /// Move the playhead to a tick.
    SeekTick(u64),
    /// Set or clear the loop.
    SetLoop(Option<LoopRange>),
    /// Change tempo.
    SetTempo(f32),
    /// Change the after-stop policy.
    SetStopBehavior(StopBehavior),
}

/// What a successful command produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Nothing to report.
    Done,
    /// A channel was created.
    Channel(ChannelId),
    /// An effect landed at this chain position.
    Effect(usize),
    /// Whether a move changed the chain.
    Moved(bool),
    /// A track was created.
    Track(TrackId),
    /// A clip landed at this lane and index.
    Clip {
        /// Lane index.
        lane: usize,
        /// Index within the lane.
        index: usize,
    },
    /// Transport state after the command.
    Transport(TransportState),
}

/// Events broadcast to every [`Engine::subscribe`](crate::Engine::subscribe) receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A channel was created.
    ChannelAdded(ChannelId),
    /// A channel was removed; `rerouted` tracks now feed master.
    ChannelRemoved {
        /// Removed channel.
        channel: ChannelId,
        /// Tracks moved to master.
        rerouted: Vec<TrackId>,
    },
    /// An effect could not be loaded and passes audio through.
    EffectFailed {
        /// Channel.
        channel: ChannelId,
        /// Chain position.
        index: usize,
        /// Effect kind.
        kind: String,
        /// Loader message.
        reason: String,
    },
    /// A track was created.
    TrackAdded(TrackId),
    /// A track was removed.
    TrackRemoved(TrackId),
    /// The transport changed state.
    TransportChanged(TransportState),
    /// A session was loaded from a project.
    ProjectLoaded {
        /// Project name.
        name: String,
    },
    /// Output started.
    Started {
        /// Backend name.
        backend: String,
        /// Negotiated sample rate in Hz.
        sample_rate: u32,
    },
    /// Output stopped.
    Stopped,
    /// The output device failed and the silent backend took over.
    DeviceFellBack {
        /// Why the device was abandoned.
        reason: String,
    },
    /// Callbacks have overrun their deadline `total` times so far.
    Underrun {
        /// Running count.
        total: u64,
    },
}
