//! The control-thread half of the engine.
//!
//! [`Engine`] owns the authoritative session model (channel graph, tracks,
//! transport). Every [`Command`] is validated and applied to the model first,
//! then mirrored to the [`Renderer`] as an [`AudioCommand`]. While the output
//! is stopped the renderer lives here and commands are applied to it directly;
//! while running it lives inside the stream callback and commands travel over
//! a bounded queue that the callback drains at the top of each buffer.
//!
//! ```text
//!   apply(Command) ──► model ──► AudioCommand ──► [queue] ──► Renderer (audio thread)
//!        │                                                       │
//!        ├──► SessionSnapshot (ArcSwap)                garbage ◄──┘
//!        └──► Notification subscribers
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use mixbus_config::{ConfigError, Project, Settings, validate_project};
use mixbus_core::{
    ChannelGraph, ChannelId, Clip, EffectChain, EffectSettings, EffectSlot, GraphError,
    LoopRange, MAX_CHAIN_LEN, StopBehavior, Track, TrackId, Transport, TransportState,
};
use mixbus_io::{
    AudioBackend, BackendStreamConfig, ErrorCallback, NullBackend, OutputCallback, StereoSamples,
    StreamHandle,
};
use mixbus_registry::EffectRegistry;

use crate::command::{Applied, Command, Notification};
use crate::error::{EngineError, Result};
use crate::renderer::{
    AudioCommand, Garbage, Renderer, RendererHost, RendererLimits, Strip, TrackVoice,
    TransportCommand,
};
use crate::shared::EngineShared;
use crate::snapshot::{SessionHandle, SessionSnapshot};

/// Queue slots kept free so one command's audio messages always fit.
const COMMAND_HEADROOM: usize = 4;

/// Per-subscriber notification backlog.
const NOTIFICATION_QUEUE: usize = 256;

/// Stream error messages buffered between polls.
const FAULT_QUEUE: usize = 16;

/// Extra time the callback gets to acknowledge a stop request.
const HALT_GRACE: Duration = Duration::from_millis(50);

/// How long to wait for a dropped stream to hand the renderer back.
const RENDERER_RETURN_TIMEOUT: Duration = Duration::from_secs(2);

/// Sizing and defaults for an [`Engine`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Session sample rate in Hz until a device negotiates another.
    pub sample_rate: f32,
    /// Largest block the renderer processes at once.
    pub max_block: usize,
    /// Channel capacity, master included.
    pub max_channels: usize,
    /// Track capacity.
    pub max_tracks: usize,
    /// Control-to-audio queue capacity.
    pub command_queue: usize,
    /// Initial tempo.
    pub bpm: f32,
    /// Initial after-stop policy.
    pub stop_behavior: StopBehavior,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            max_block: 256,
            max_channels: 64,
            max_tracks: 256,
            command_queue: 1024,
            bpm: 120.0,
            stop_behavior: StopBehavior::GoToStart,
        }
    }
}

impl EngineConfig {
    /// Build from user settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            sample_rate: settings.audio.sample_rate as f32,
            max_block: settings.audio.buffer_size as usize,
            max_channels: settings.engine.max_channels,
            max_tracks: settings.engine.max_tracks,
            command_queue: settings.engine.command_queue,
            bpm: settings.transport.bpm,
            stop_behavior: settings.engine.after_stop.into(),
        }
    }

    fn sanitized(mut self) -> Self {
        self.max_block = self.max_block.max(1);
        self.max_channels = self.max_channels.max(1);
        self.command_queue = self.command_queue.max(COMMAND_HEADROOM * 2);
        self
    }

    fn limits(&self) -> RendererLimits {
        RendererLimits {
            max_block: self.max_block,
            max_channels: self.max_channels,
            max_tracks: self.max_tracks,
        }
    }
}

/// Fixed table mapping channels to renderer strip slots.
#[derive(Debug)]
struct SlotTable {
    owners: Vec<Option<ChannelId>>,
}

impl SlotTable {
    fn new(capacity: usize) -> Self {
        Self {
            owners: vec![None; capacity],
        }
    }

    fn allocate(&mut self, id: ChannelId) -> Option<usize> {
        let slot = self.owners.iter().position(Option::is_none)?;
        self.owners[slot] = Some(id);
        Some(slot)
    }

    fn release(&mut self, id: ChannelId) -> Option<usize> {
        let slot = self.slot_of(id)?;
        self.owners[slot] = None;
        Some(slot)
    }

    fn slot_of(&self, id: ChannelId) -> Option<usize> {
        self.owners.iter().position(|owner| *owner == Some(id))
    }

    fn pairs(&self) -> Vec<(ChannelId, usize)> {
        self.owners
            .iter()
            .enumerate()
            .filter_map(|(slot, owner)| owner.map(|id| (id, slot)))
            .collect()
    }
}

struct ActiveStream {
    handle: StreamHandle,
    backend: Box<dyn AudioBackend>,
    config: BackendStreamConfig,
}

/// A running mixer session.
///
/// All methods run on the control thread. Readers on other threads use a
/// [`SessionHandle`] from [`Engine::handle`].
///
/// ```rust
/// use mixbus_core::{ChannelId, EffectSettings};
/// use mixbus_engine::{Applied, Command, Engine, EngineConfig};
///
/// let mut engine = Engine::new(EngineConfig::default());
/// let Applied::Channel(drums) = engine.apply(Command::AddChannel { name: "Drums".into() }).unwrap()
/// else { unreachable!() };
/// engine
///     .apply(Command::InsertEffect {
///         channel: drums,
///         index: None,
///         effect: EffectSettings::new("delay"),
///     })
///     .unwrap();
///
/// // a send back from master would close a loop
/// assert!(engine.apply(Command::AddSend { from: ChannelId::MASTER, to: drums, gain: 1.0 }).is_err());
///
/// let audio = engine.render_offline(1024).unwrap();
/// assert_eq!(audio.len(), 1024);
/// ```
pub struct Engine {
    config: EngineConfig,
    registry: EffectRegistry,
    graph: ChannelGraph,
    tracks: Vec<Track>,
    next_track: u32,
    transport: Transport,
    slots: SlotTable,
    commands: Sender<AudioCommand>,
    command_rx: Receiver<AudioCommand>,
    garbage: Receiver<Garbage>,
    garbage_tx: Sender<Garbage>,
    /// `Some` while the output is stopped.
    renderer: Option<Renderer>,
    home_tx: Sender<Renderer>,
    home_rx: Receiver<Renderer>,
    faults_tx: Sender<String>,
    faults: Receiver<String>,
    shared: Arc<EngineShared>,
    snapshot: Arc<ArcSwap<SessionSnapshot>>,
    version: u64,
    subscribers: Vec<Sender<Notification>>,
    stream: Option<ActiveStream>,
    reported_underruns: u64,
}

impl Engine {
    /// Engine with the built-in effects and instruments.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(config, EffectRegistry::new())
    }

    /// Engine that resolves effect kinds through `registry`.
    pub fn with_registry(config: EngineConfig, registry: EffectRegistry) -> Self {
        let config = config.sanitized();
        let (commands, command_rx) = bounded(config.command_queue);
        let (garbage_tx, garbage) = bounded(config.command_queue * 2);
        let (home_tx, home_rx) = bounded(1);
        let (faults_tx, faults) = bounded(FAULT_QUEUE);
        let shared = Arc::new(EngineShared::new(config.max_channels));

        let mut transport = Transport::new(config.sample_rate, config.bpm);
        transport.set_stop_behavior(config.stop_behavior);
        let graph = ChannelGraph::new();
        let snapshot = Arc::new(ArcSwap::from_pointee(SessionSnapshot::capture(
            0,
            &graph,
            &[],
            &transport,
            Vec::new(),
        )));

        let mut engine = Self {
            slots: SlotTable::new(config.max_channels),
            config,
            registry,
            graph: graph.clone(),
            tracks: Vec::new(),
            next_track: 0,
            transport: transport.clone(),
            commands,
            command_rx,
            garbage,
            garbage_tx,
            renderer: None,
            home_tx,
            home_rx,
            faults_tx,
            faults,
            shared,
            snapshot,
            version: 0,
            subscribers: Vec::new(),
            stream: None,
            reported_underruns: 0,
        };
        engine.install_session(graph, Vec::new(), transport);
        engine
    }

    /// Apply one command.
    ///
    /// Validation happens against the model before anything reaches the audio
    /// thread, so a rejected command leaves the session untouched.
    pub fn apply(&mut self, command: Command) -> Result<Applied> {
        self.collect_garbage();
        self.ensure_headroom()?;

        let applied = match command {
            Command::AddChannel { name } => self.add_channel(name),
            Command::RemoveChannel(id) => self.remove_channel(id),
            Command::RenameChannel { channel, name } => {
                self.graph.set_name(channel, name)?;
                Ok(Applied::Done)
            }
            Command::AddSend { from, to, gain } => {
                self.graph.add_send(from, to, gain)?;
                self.publish_plan()?;
                Ok(Applied::Done)
            }
            Command::RemoveSend { from, to } => {
                self.graph.remove_send(from, to)?;
                self.publish_plan()?;
                Ok(Applied::Done)
            }
            Command::SetVolume { channel, volume } => {
                self.graph.set_volume(channel, volume)?;
                self.publish_plan()?;
                Ok(Applied::Done)
            }
            Command::SetPan { channel, pan } => {
                self.graph.set_pan(channel, pan)?;
                self.publish_plan()?;
                Ok(Applied::Done)
            }
            Command::SetMute { channel, muted } => {
                self.graph.set_muted(channel, muted)?;
                self.publish_plan()?;
                Ok(Applied::Done)
            }
            Command::SetSolo { channel, solo } => {
                self.graph.set_solo(channel, solo)?;
                self.publish_plan()?;
                Ok(Applied::Done)
            }

            Command::InsertEffect {
                channel,
                index,
                effect,
            } => self.insert_effect(channel, index, effect),
            Command::RemoveEffect { channel, index } => {
                let slot = self.strip_slot(channel)?;
                let removed = self.graph.remove_effect(channel, index)?;
                self.forward(AudioCommand::RemoveEffect { slot, index })?;
                tracing::debug!(%channel, index, kind = %removed.kind, "effect removed");
                Ok(Applied::Done)
            }
            Command::MoveEffectUp { channel, index } => self.move_effect(channel, index, true),
            Command::MoveEffectDown { channel, index } => self.move_effect(channel, index, false),
            Command::SetEffectParam {
                channel,
                index,
                param,
                value,
            } => self.set_effect_param(channel, index, param, value),
            Command::SetEffectEnabled {
                channel,
                index,
                enabled,
            } => {
                let slot = self.strip_slot(channel)?;
                self.graph.effect_mut(channel, index)?.enabled = enabled;
                self.forward(AudioCommand::SetEffectEnabled {
                    slot,
                    index,
                    enabled,
                })?;
                Ok(Applied::Done)
            }
            Command::SetEffectWetDry {
                channel,
                index,
                wet_dry,
            } => {
                let slot = self.strip_slot(channel)?;
                let wet_dry = wet_dry.clamp(0.0, 1.0);
                self.graph.effect_mut(channel, index)?.wet_dry = wet_dry;
                self.forward(AudioCommand::SetEffectWetDry {
                    slot,
                    index,
                    wet_dry,
                })?;
                Ok(Applied::Done)
            }
            Command::SetEffectShutoff {
                channel,
                index,
                gate_db,
                decay_ms,
                auto_shutoff,
            } => {
                let slot = self.strip_slot(channel)?;
                let decay_ms = decay_ms.max(0.0);
                let settings = self.graph.effect_mut(channel, index)?;
                settings.gate_db = gate_db;
                settings.decay_ms = decay_ms;
                settings.auto_shutoff = auto_shutoff;
                self.forward(AudioCommand::SetEffectShutoff {
                    slot,
                    index,
                    gate_db,
                    decay_ms,
                    auto_shutoff,
                })?;
                Ok(Applied::Done)
            }

            Command::AddTrack {
                name,
                channel,
                instrument,
            } => self.add_track(name, channel, instrument),
            Command::RemoveTrack(id) => {
                let pos = self.track_index(id)?;
                self.tracks.remove(pos);
                self.forward(AudioCommand::RemoveTrack(id))?;
                self.notify(Notification::TrackRemoved(id));
                Ok(Applied::Done)
            }
            Command::RouteTrack { track, channel } => {
                if !self.graph.contains(channel) {
                    return Err(GraphError::ChannelNotFound(channel).into());
                }
                let pos = self.track_index(track)?;
                self.tracks[pos].channel = channel;
                self.sync_track(pos)?;
                Ok(Applied::Done)
            }
            Command::SetTrackGain { track, gain } => {
                let pos = self.track_index(track)?;
                self.tracks[pos].gain = gain.max(0.0);
                self.sync_track(pos)?;
                Ok(Applied::Done)
            }
            Command::SetTrackMute { track, muted } => {
                let pos = self.track_index(track)?;
                self.tracks[pos].muted = muted;
                self.sync_track(pos)?;
                Ok(Applied::Done)
            }
            Command::SetInstrument { track, instrument } => {
                self.set_instrument(track, instrument)
            }
            Command::AddClip { track, lane, clip } => self.add_clip(track, lane, clip),
            Command::RemoveClip { track, lane, index } => {
                let pos = self.track_index(track)?;
                self.tracks[pos]
                    .remove_clip(lane, index)
                    .ok_or(EngineError::ClipNotFound { track, lane, index })?;
                self.sync_track(pos)?;
                Ok(Applied::Done)
            }

            Command::Play => {
                let before = self.transport.state();
                self.transport.play();
                self.transport_changed(before, TransportCommand::Play)
            }
            Command::Stop => {
                let before = self.transport.state();
                self.transport.stop();
                self.transport_changed(before, TransportCommand::Stop)
            }
            Command::ToggleRecord => {
                let before = self.transport.state();
                self.transport.toggle_record()?;
                self.transport_changed(before, TransportCommand::ToggleRecord)
            }
            Command::Seek(frame) => self.seek(frame),
            Command::SeekTick(tick) => self.seek(self.transport.timing().tick_to_frame(tick)),
            Command::SetLoop(range) => self.set_loop(range),
            Command::SetTempo(bpm) => {
                let before = self.transport.state();
                self.transport.set_tempo(bpm);
                self.transport_changed(before, TransportCommand::SetTempo(self.transport.bpm()))
            }
            Command::SetStopBehavior(behavior) => {
                let before = self.transport.state();
                self.transport.set_stop_behavior(behavior);
                self.transport_changed(before, TransportCommand::SetStopBehavior(behavior))
            }
        }?;

        self.publish_snapshot();
        Ok(applied)
    }

    /// New receiver for session notifications.
    ///
    /// A receiver that falls more than a few hundred events behind misses
    /// the overflow; a dropped receiver is forgotten.
    pub fn subscribe(&mut self) -> Receiver<Notification> {
        let (tx, rx) = bounded(NOTIFICATION_QUEUE);
        self.subscribers.push(tx);
        rx
    }

    /// Thread-safe reader for snapshots, meters and the playhead.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(Arc::clone(&self.snapshot), Arc::clone(&self.shared))
    }

    /// Engine sizing.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Effect and instrument factories.
    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    /// The channel graph as the control thread sees it.
    pub fn graph(&self) -> &ChannelGraph {
        &self.graph
    }

    /// Tracks in creation order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Transport settings. The live playhead is on [`SessionHandle::position`].
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Current session sample rate.
    pub fn sample_rate(&self) -> f32 {
        self.transport.timing().sample_rate
    }

    /// Whether an output stream is running.
    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// Name of the backend currently driving the renderer.
    pub fn backend_name(&self) -> Option<&str> {
        self.stream.as_ref().map(|s| s.backend.name())
    }

    // --- output ---

    /// Start output on `backend`.
    ///
    /// The session is retuned to the rate the device actually runs at. If the
    /// device cannot be opened the engine keeps running on a silent
    /// [`NullBackend`] and broadcasts [`Notification::DeviceFellBack`].
    /// A device name that matches nothing is returned as an error instead.
    pub fn start(&mut self, backend: Box<dyn AudioBackend>, config: BackendStreamConfig) -> Result<()> {
        if self.stream.is_some() {
            return Err(EngineError::Running);
        }
        self.collect_garbage();

        let mut config = config;
        config.sample_rate = backend.actual_sample_rate(&config);
        self.retune(config.sample_rate as f32);

        match self.arm(backend.as_ref(), &config) {
            Ok(handle) => {
                let name = backend.name().to_string();
                tracing::info!(
                    backend = %name,
                    sample_rate = config.sample_rate,
                    buffer_size = config.buffer_size,
                    channels = config.channels,
                    "output started"
                );
                self.stream = Some(ActiveStream {
                    handle,
                    backend,
                    config: config.clone(),
                });
                self.notify(Notification::Started {
                    backend: name,
                    sample_rate: config.sample_rate,
                });
                Ok(())
            }
            Err(e) if is_device_failure(&e) => self.fall_back(config, e.to_string()),
            Err(e) => Err(e),
        }
    }

    /// Handle stream faults, free retired audio objects and report underruns.
    ///
    /// Call periodically from the control loop while output runs.
    pub fn poll(&mut self) -> Result<()> {
        self.collect_garbage();

        let mut fault = None;
        while let Ok(message) = self.faults.try_recv() {
            fault.get_or_insert(message);
        }
        if let Some(reason) = fault
            && let Some(active) = self.stream.take()
        {
            let config = active.config.clone();
            self.halt(active)?;
            self.fall_back(config, reason)?;
        }

        let total = self.shared.underruns.load(Ordering::Relaxed);
        if total > self.reported_underruns {
            self.reported_underruns = total;
            tracing::debug!(total, "audio callback missed its deadline");
            self.notify(Notification::Underrun { total });
        }
        Ok(())
    }

    /// Stop output and take the renderer back. A no-op when already stopped.
    pub fn stop(&mut self) -> Result<()> {
        let Some(active) = self.stream.take() else {
            return Ok(());
        };
        self.halt(active)?;
        tracing::info!("output stopped");
        self.notify(Notification::Stopped);
        Ok(())
    }

    /// Render into caller buffers without a device. Fails while running.
    pub fn render_into(&mut self, left: &mut [f32], right: &mut [f32]) -> Result<()> {
        self.collect_garbage();
        let renderer = self.renderer.as_mut().ok_or(EngineError::Running)?;
        renderer.render_stereo(left, right);
        Ok(())
    }

    /// Render `frames` of master output without a device.
    pub fn render_offline(&mut self, frames: usize) -> Result<StereoSamples> {
        let mut left = vec![0.0; frames];
        let mut right = vec![0.0; frames];
        self.render_into(&mut left, &mut right)?;
        Ok(StereoSamples::new(left, right))
    }

    // --- projects ---

    /// Replace the session with `project`. Relative audio paths resolve
    /// against `base_dir`. Only allowed while output is stopped.
    ///
    /// Effects that fail to load pass audio through and are reported with
    /// [`Notification::EffectFailed`].
    pub fn load_project(&mut self, project: &Project, base_dir: &Path) -> Result<()> {
        if self.stream.is_some() {
            return Err(EngineError::Running);
        }
        validate_project(project, &self.registry).map_err(ConfigError::from)?;

        let graph = project.to_graph()?;
        if graph.len() > self.config.max_channels {
            return Err(EngineError::TooManyChannels(self.config.max_channels));
        }
        if let Some(full) = graph.channels().find(|c| c.effects.len() > MAX_CHAIN_LEN) {
            return Err(EngineError::ChainFull(full.id));
        }
        if project.tracks.len() > self.config.max_tracks {
            return Err(EngineError::TooManyTracks(self.config.max_tracks));
        }
        let tracks = project.build_tracks(base_dir)?;
        let transport = project.transport.to_transport(self.sample_rate())?;

        let channels = graph.len();
        let track_count = tracks.len();
        self.install_session(graph, tracks, transport);
        tracing::info!(project = %project.name, channels, tracks = track_count, "project loaded");
        self.notify(Notification::ProjectLoaded {
            name: project.name.clone(),
        });
        Ok(())
    }

    /// Capture the session as a project.
    pub fn to_project(&self, name: impl Into<String>) -> Project {
        Project::from_session(name, &self.graph, &self.tracks, &self.transport)
    }

    // --- channel commands ---

    fn add_channel(&mut self, name: String) -> Result<Applied> {
        if self.graph.len() >= self.config.max_channels {
            return Err(EngineError::TooManyChannels(self.config.max_channels));
        }
        let id = self.graph.add_channel(name);
        let Some(slot) = self.slots.allocate(id) else {
            self.graph.remove_channel(id)?;
            return Err(EngineError::TooManyChannels(self.config.max_channels));
        };
        self.forward(AudioCommand::AddStrip {
            slot,
            strip: Box::new(Strip::new(EffectChain::new(), self.config.max_block)),
        })?;
        self.publish_plan()?;
        tracing::debug!(channel = %id, slot, "channel added");
        self.notify(Notification::ChannelAdded(id));
        Ok(Applied::Channel(id))
    }

    fn remove_channel(&mut self, id: ChannelId) -> Result<Applied> {
        self.graph.remove_channel(id)?;

        let mut rerouted = Vec::new();
        for track in &mut self.tracks {
            if track.channel == id {
                track.channel = ChannelId::MASTER;
                rerouted.push(track.id);
            }
        }

        self.publish_plan()?;
        if let Some(slot) = self.slots.release(id) {
            let reroute_to = self.slots.slot_of(ChannelId::MASTER);
            self.forward(AudioCommand::RemoveStrip { slot, reroute_to })?;
        }
        tracing::debug!(channel = %id, rerouted = rerouted.len(), "channel removed");
        self.notify(Notification::ChannelRemoved {
            channel: id,
            rerouted,
        });
        Ok(Applied::Done)
    }

    // --- effect commands ---

    fn insert_effect(
        &mut self,
        channel: ChannelId,
        index: Option<usize>,
        mut settings: EffectSettings,
    ) -> Result<Applied> {
        let slot = self.strip_slot(channel)?;
        let len = self
            .graph
            .channel(channel)
            .ok_or(GraphError::ChannelNotFound(channel))?
            .effects
            .len();
        if len >= MAX_CHAIN_LEN {
            return Err(EngineError::ChainFull(channel));
        }

        let (effect, failure) = self.instantiate(&mut settings);
        let kind = settings.kind.clone();
        let index = self
            .graph
            .insert_effect(channel, index.unwrap_or(len), settings)?;
        self.forward(AudioCommand::InsertEffect {
            slot,
            index,
            effect,
        })?;

        tracing::debug!(%channel, index, %kind, "effect inserted");
        if let Some(reason) = failure {
            self.notify(Notification::EffectFailed {
                channel,
                index,
                kind,
                reason,
            });
        }
        Ok(Applied::Effect(index))
    }

    fn move_effect(&mut self, channel: ChannelId, index: usize, up: bool) -> Result<Applied> {
        let slot = self.strip_slot(channel)?;
        let moved = if up {
            self.graph.move_effect_up(channel, index)?
        } else {
            self.graph.move_effect_down(channel, index)?
        };
        if moved {
            self.forward(AudioCommand::MoveEffect { slot, index, up })?;
        }
        Ok(Applied::Moved(moved))
    }

    fn set_effect_param(
        &mut self,
        channel: ChannelId,
        index: usize,
        param: String,
        value: f32,
    ) -> Result<Applied> {
        let slot = self.strip_slot(channel)?;
        let settings = self.graph.effect_mut(channel, index)?;
        let descriptors = self
            .registry
            .param_descriptors(&settings.kind)
            .unwrap_or_default();
        let Some((param_index, descriptor)) = descriptors
            .iter()
            .enumerate()
            .find(|(_, d)| d.string_id == param)
        else {
            return Err(EngineError::UnknownParameter {
                effect: settings.kind.clone(),
                param,
            });
        };

        let value = value.clamp(descriptor.min, descriptor.max);
        settings.params.insert(param, value);
        self.forward(AudioCommand::SetEffectParam {
            slot,
            index,
            param: param_index,
            value,
        })?;
        Ok(Applied::Done)
    }

    /// Build the audio-side slot for `settings`, recording any load failure
    /// on the settings themselves.
    fn instantiate(&self, settings: &mut EffectSettings) -> (EffectSlot, Option<String>) {
        let sample_rate = self.sample_rate();
        match self.registry.create(&settings.kind, sample_rate) {
            Ok(effect) => {
                settings.failed = false;
                let slot =
                    EffectSlot::from_settings(settings, Some(effect), sample_rate, self.config.max_block);
                if let Some(effect) = slot.effect() {
                    settings.capture_defaults(effect);
                }
                (slot, None)
            }
            Err(e) => {
                tracing::warn!(kind = %settings.kind, error = %e, "effect failed to load; passing audio through");
                settings.failed = true;
                let slot = EffectSlot::from_settings(settings, None, sample_rate, self.config.max_block);
                (slot, Some(e.to_string()))
            }
        }
    }

    // --- track commands ---

    fn add_track(
        &mut self,
        name: String,
        channel: ChannelId,
        instrument: Option<String>,
    ) -> Result<Applied> {
        if !self.graph.contains(channel) {
            return Err(GraphError::ChannelNotFound(channel).into());
        }
        if self.tracks.len() >= self.config.max_tracks {
            return Err(EngineError::TooManyTracks(self.config.max_tracks));
        }
        let voice_instrument = instrument
            .as_deref()
            .map(|kind| self.registry.create_instrument(kind, self.sample_rate()))
            .transpose()?;

        let id = TrackId(self.next_track);
        self.next_track += 1;
        let mut track = Track::new(id, name).with_channel(channel);
        track.instrument = instrument;

        self.forward(AudioCommand::AddTrack(Box::new(TrackVoice {
            track: Box::new(track.clone()),
            slot: self.slots.slot_of(channel),
            instrument: voice_instrument,
        })))?;
        self.tracks.push(track);
        tracing::debug!(track = %id, %channel, "track added");
        self.notify(Notification::TrackAdded(id));
        Ok(Applied::Track(id))
    }

    fn set_instrument(&mut self, track: TrackId, instrument: Option<String>) -> Result<Applied> {
        let pos = self.track_index(track)?;
        let voice_instrument = instrument
            .as_deref()
            .map(|kind| self.registry.create_instrument(kind, self.sample_rate()))
            .transpose()?;
        self.tracks[pos].instrument = instrument;
        self.forward(AudioCommand::SetInstrument {
            track,
            instrument: voice_instrument,
        })?;
        self.sync_track(pos)?;
        Ok(Applied::Done)
    }

    fn add_clip(&mut self, track: TrackId, lane: Option<usize>, clip: Clip) -> Result<Applied> {
        let pos = self.track_index(track)?;
        let start = clip.start_tick;
        let target = &mut self.tracks[pos];
        let (lane, index) = match lane {
            Some(lane) => (lane, target.insert_clip(lane, clip)?),
            None => {
                let lane = target.place_clip(clip)?;
                let index = target.lanes()[lane]
                    .clips()
                    .iter()
                    .position(|c| c.start_tick == start)
                    .unwrap_or_default();
                (lane, index)
            }
        };
        self.sync_track(pos)?;
        Ok(Applied::Clip { lane, index })
    }

    /// Mirror the model track at `pos` to the renderer.
    fn sync_track(&mut self, pos: usize) -> Result<()> {
        let track = self.tracks[pos].clone();
        let slot = self.slots.slot_of(track.channel);
        self.forward(AudioCommand::UpdateTrack {
            track: Box::new(track),
            slot,
        })
    }

    fn track_index(&self, id: TrackId) -> Result<usize> {
        self.tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or(EngineError::TrackNotFound(id))
    }

    // --- transport commands ---

    fn seek(&mut self, frame: u64) -> Result<Applied> {
        let before = self.transport.state();
        self.transport.seek(frame);
        self.transport_changed(before, TransportCommand::Seek(frame))
    }

    fn set_loop(&mut self, range: Option<LoopRange>) -> Result<Applied> {
        let before = self.transport.state();
        self.transport.set_loop(range)?;
        self.transport_changed(before, TransportCommand::SetLoop(range))
    }

    /// Forward a transport command already applied to the control-side
    /// transport, notifying when it moved the state away from `before`.
    fn transport_changed(&mut self, before: TransportState, command: TransportCommand) -> Result<Applied> {
        self.forward(AudioCommand::Transport(command))?;
        let state = self.transport.state();
        if state != before {
            tracing::debug!(?state, "transport changed");
            self.notify(Notification::TransportChanged(state));
        }
        Ok(Applied::Transport(state))
    }

    // --- plumbing ---

    fn strip_slot(&self, channel: ChannelId) -> Result<usize> {
        self.slots
            .slot_of(channel)
            .ok_or(EngineError::Graph(GraphError::ChannelNotFound(channel)))
    }

    /// Compile the graph and hand the plan to the renderer.
    fn publish_plan(&mut self) -> Result<()> {
        let plan = self.graph.compile(|id| self.slots.slot_of(id));
        self.forward(AudioCommand::InstallPlan(Arc::new(plan)))
    }

    /// Deliver a command to the renderer wherever it currently lives.
    fn forward(&mut self, command: AudioCommand) -> Result<()> {
        match self.renderer.as_mut() {
            Some(renderer) => {
                renderer.apply(command);
                Ok(())
            }
            None => self.commands.try_send(command).map_err(|e| match e {
                TrySendError::Full(_) => EngineError::QueueFull,
                TrySendError::Disconnected(_) => EngineError::RendererLost,
            }),
        }
    }

    /// Reject a command up front when the queue could not take all of its
    /// audio messages, so the model never runs ahead of the renderer.
    fn ensure_headroom(&self) -> Result<()> {
        if self.renderer.is_some() {
            return Ok(());
        }
        match self.commands.capacity() {
            Some(cap) if self.commands.len() + COMMAND_HEADROOM > cap => Err(EngineError::QueueFull),
            _ => Ok(()),
        }
    }

    fn collect_garbage(&mut self) {
        let freed = self.garbage.try_iter().count();
        if freed > 0 {
            tracing::trace!(freed, "freed retired audio objects");
        }
    }

    fn publish_snapshot(&mut self) {
        self.version += 1;
        self.snapshot.store(Arc::new(SessionSnapshot::capture(
            self.version,
            &self.graph,
            &self.tracks,
            &self.transport,
            self.slots.pairs(),
        )));
    }

    fn notify(&mut self, notification: Notification) {
        self.subscribers
            .retain(|tx| match tx.try_send(notification.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!("subscriber is lagging; notification dropped");
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
    }

    fn fresh_renderer(&self, transport: Transport) -> Renderer {
        Renderer::new(
            transport,
            self.config.limits(),
            self.command_rx.clone(),
            self.garbage_tx.clone(),
            Arc::clone(&self.shared),
        )
    }

    /// Swap in a whole new session. Sizes must already be checked.
    fn install_session(&mut self, mut graph: ChannelGraph, tracks: Vec<Track>, transport: Transport) {
        let sample_rate = transport.timing().sample_rate;
        let mut renderer = self.fresh_renderer(transport.clone());
        self.slots = SlotTable::new(self.config.max_channels);
        let mut failures = Vec::new();

        let ids: Vec<ChannelId> = graph.channels().map(|c| c.id).collect();
        for id in ids {
            let Some(slot) = self.slots.allocate(id) else {
                break;
            };
            let mut chain = EffectChain::new();
            let count = graph.channel(id).map_or(0, |c| c.effects.len());
            for index in 0..count.min(MAX_CHAIN_LEN) {
                let Ok(settings) = graph.effect_mut(id, index) else {
                    continue;
                };
                let (effect, failure) = self.instantiate(settings);
                chain.push(effect);
                if let Some(reason) = failure {
                    failures.push(Notification::EffectFailed {
                        channel: id,
                        index,
                        kind: settings.kind.clone(),
                        reason,
                    });
                }
            }
            renderer.apply(AudioCommand::AddStrip {
                slot,
                strip: Box::new(Strip::new(chain, self.config.max_block)),
            });
        }

        for track in &tracks {
            let instrument = track.instrument.as_deref().and_then(|kind| {
                self.registry
                    .create_instrument(kind, sample_rate)
                    .inspect_err(|e| {
                        tracing::warn!(track = %track.id, kind, error = %e, "instrument failed to load");
                    })
                    .ok()
            });
            renderer.apply(AudioCommand::AddTrack(Box::new(TrackVoice {
                track: Box::new(track.clone()),
                slot: self.slots.slot_of(track.channel),
                instrument,
            })));
        }
        let plan = graph.compile(|id| self.slots.slot_of(id));
        renderer.apply(AudioCommand::InstallPlan(Arc::new(plan)));

        self.next_track = tracks.iter().map(|t| t.id.0 + 1).max().unwrap_or(0);
        self.graph = graph;
        self.tracks = tracks;
        self.transport = transport;
        self.shared.clear_meters();
        self.renderer = Some(renderer);
        self.collect_garbage();
        self.publish_snapshot();
        for failure in failures {
            self.notify(failure);
        }
    }

    /// Retune the session to a device rate. Output must be stopped.
    fn retune(&mut self, sample_rate: f32) {
        if (sample_rate - self.sample_rate()).abs() <= f32::EPSILON {
            return;
        }
        tracing::info!(from = self.sample_rate(), to = sample_rate, "retuning session");
        self.transport.set_sample_rate(sample_rate);
        self.config.sample_rate = sample_rate;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_sample_rate(sample_rate);
        }
        self.publish_snapshot();
    }

    /// Move the renderer into a new stream on `backend`.
    ///
    /// On failure the renderer is recovered before the error is returned.
    fn arm(&mut self, backend: &dyn AudioBackend, config: &BackendStreamConfig) -> Result<StreamHandle> {
        let renderer = self.renderer.take().ok_or(EngineError::RendererLost)?;
        self.shared.stopping.store(false, Ordering::Release);
        self.shared.halted.store(false, Ordering::Release);

        let channels = usize::from(config.channels);
        let mut host = RendererHost::new(renderer, self.home_tx.clone());
        let callback: OutputCallback = Box::new(move |data: &mut [f32]| host.process(data, channels));

        let shared = Arc::clone(&self.shared);
        let faults = self.faults_tx.clone();
        let error_callback: ErrorCallback = Box::new(move |message: &str| {
            shared.stream_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = message, "output stream error");
            let _ = faults.try_send(message.to_string());
        });

        match backend.build_output_stream(config, callback, error_callback) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.recover_renderer()?;
                Err(e.into())
            }
        }
    }

    fn fall_back(&mut self, config: BackendStreamConfig, reason: String) -> Result<()> {
        tracing::warn!(%reason, "output device unavailable; continuing on the null device");
        let null: Box<dyn AudioBackend> = Box::new(NullBackend::new());
        let handle = self.arm(null.as_ref(), &config)?;
        self.stream = Some(ActiveStream {
            handle,
            backend: null,
            config,
        });
        self.notify(Notification::DeviceFellBack { reason });
        Ok(())
    }

    /// Ask the callback to go quiet, drop the stream and take the renderer back.
    fn halt(&mut self, active: ActiveStream) -> Result<()> {
        self.shared.stopping.store(true, Ordering::Release);

        let rate = f64::from(active.config.sample_rate.max(1));
        let buffer = Duration::from_secs_f64(f64::from(active.config.buffer_size) / rate);
        let deadline = Instant::now() + buffer * 4 + HALT_GRACE;
        while !self.shared.halted.load(Ordering::Acquire) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        if !self.shared.halted.load(Ordering::Acquire) {
            tracing::warn!("audio callback did not acknowledge stop");
        }

        drop(active.handle);
        let recovered = self.recover_renderer();
        self.shared.stopping.store(false, Ordering::Release);
        self.shared.halted.store(false, Ordering::Release);
        self.collect_garbage();
        recovered
    }

    fn recover_renderer(&mut self) -> Result<()> {
        let mut renderer = self
            .home_rx
            .recv_timeout(RENDERER_RETURN_TIMEOUT)
            .map_err(|_| EngineError::RendererLost)?;
        renderer.drain_commands();
        self.renderer = Some(renderer);
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(active) = self.stream.take()
            && let Err(e) = self.halt(active)
        {
            tracing::warn!(error = %e, "output did not stop cleanly");
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("channels", &self.graph.len())
            .field("tracks", &self.tracks.len())
            .field("sample_rate", &self.sample_rate())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Failures that the null device can stand in for.
fn is_device_failure(error: &EngineError) -> bool {
    matches!(
        error,
        EngineError::Audio(
            mixbus_io::Error::DeviceUnavailable(_)
                | mixbus_io::Error::NoDevice
                | mixbus_io::Error::Stream(_)
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixbus_core::{AudioClip, ClipContent};

    fn engine() -> Engine {
        Engine::new(EngineConfig {
            max_block: 64,
            ..EngineConfig::default()
        })
    }

    fn channel(engine: &mut Engine, name: &str) -> ChannelId {
        match engine.apply(Command::AddChannel { name: name.into() }).unwrap() {
            Applied::Channel(id) => id,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn track(engine: &mut Engine, channel: ChannelId) -> TrackId {
        match engine
            .apply(Command::AddTrack {
                name: "t".into(),
                channel,
                instrument: None,
            })
            .unwrap()
        {
            Applied::Track(id) => id,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn constant_clip(value: f32) -> Clip {
        let frames = 48000;
        Clip::new(
            0,
            96,
            ClipContent::Audio(AudioClip::new(vec![value; frames], vec![value; frames])),
        )
    }

    #[test]
    fn test_new_engine_has_master_only() {
        let engine = engine();
        assert_eq!(engine.graph().len(), 1);
        assert!(engine.graph().contains(ChannelId::MASTER));
        assert!(!engine.is_running());
        assert_eq!(engine.handle().snapshot().version, 1);
    }

    #[test]
    fn test_cycle_is_rejected_and_session_unchanged() {
        let mut engine = engine();
        let a = channel(&mut engine, "A");
        let b = channel(&mut engine, "B");
        engine
            .apply(Command::AddSend {
                from: a,
                to: b,
                gain: 1.0,
            })
            .unwrap();
        let version = engine.handle().snapshot().version;

        let err = engine
            .apply(Command::AddSend {
                from: b,
                to: a,
                gain: 1.0,
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::Graph(GraphError::Cycle(_))));
        assert_eq!(engine.graph().send_gain(b, a), None);
        assert_eq!(engine.handle().snapshot().version, version);
    }

    #[test]
    fn test_channel_limit() {
        let mut engine = Engine::new(EngineConfig {
            max_channels: 2,
            ..EngineConfig::default()
        });
        channel(&mut engine, "A");
        let err = engine
            .apply(Command::AddChannel { name: "B".into() })
            .unwrap_err();
        assert!(matches!(err, EngineError::TooManyChannels(2)));
    }

    #[test]
    fn test_removed_channel_reroutes_tracks_to_master() {
        let mut engine = engine();
        let rx = engine.subscribe();
        let a = channel(&mut engine, "A");
        let t = track(&mut engine, a);
        engine
            .apply(Command::AddClip {
                track: t,
                lane: None,
                clip: constant_clip(0.25),
            })
            .unwrap();
        engine.apply(Command::RemoveChannel(a)).unwrap();
        engine.apply(Command::Play).unwrap();

        assert_eq!(engine.tracks()[0].channel, ChannelId::MASTER);
        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.contains(&Notification::ChannelRemoved {
            channel: a,
            rerouted: vec![t],
        }));

        let audio = engine.render_offline(64).unwrap();
        assert!((audio.left[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_insert_effect_captures_defaults() {
        let mut engine = engine();
        let applied = engine
            .apply(Command::InsertEffect {
                channel: ChannelId::MASTER,
                index: None,
                effect: EffectSettings::new("amp"),
            })
            .unwrap();
        assert_eq!(applied, Applied::Effect(0));
        let settings = &engine.graph().channel(ChannelId::MASTER).unwrap().effects[0];
        assert!(!settings.failed);
        assert!(!settings.params.is_empty());
    }

    #[test]
    fn test_unknown_effect_loads_as_failed_passthrough() {
        let mut engine = engine();
        let rx = engine.subscribe();
        engine
            .apply(Command::InsertEffect {
                channel: ChannelId::MASTER,
                index: None,
                effect: EffectSettings::new("no_such_effect"),
            })
            .unwrap();
        assert_eq!(engine.handle().snapshot().failed_effects(ChannelId::MASTER), 1);
        assert!(matches!(
            rx.try_recv(),
            Ok(Notification::EffectFailed { index: 0, .. })
        ));

        let t = track(&mut engine, ChannelId::MASTER);
        engine
            .apply(Command::AddClip {
                track: t,
                lane: Some(0),
                clip: constant_clip(0.5),
            })
            .unwrap();
        engine.apply(Command::Play).unwrap();
        let audio = engine.render_offline(64).unwrap();
        assert!((audio.right[10] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_set_param_clamps_and_rejects_unknown() {
        let mut engine = engine();
        engine
            .apply(Command::InsertEffect {
                channel: ChannelId::MASTER,
                index: None,
                effect: EffectSettings::new("amp"),
            })
            .unwrap();
        let descriptors = engine.registry().param_descriptors("amp").unwrap();
        let first = &descriptors[0];

        engine
            .apply(Command::SetEffectParam {
                channel: ChannelId::MASTER,
                index: 0,
                param: first.string_id.into(),
                value: first.max + 1000.0,
            })
            .unwrap();
        let stored = engine.graph().channel(ChannelId::MASTER).unwrap().effects[0].params
            [first.string_id];
        assert_eq!(stored, first.max);

        let err = engine
            .apply(Command::SetEffectParam {
                channel: ChannelId::MASTER,
                index: 0,
                param: "nope".into(),
                value: 0.0,
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownParameter { .. }));
    }

    #[test]
    fn test_chain_full() {
        let mut engine = engine();
        for _ in 0..MAX_CHAIN_LEN {
            engine
                .apply(Command::InsertEffect {
                    channel: ChannelId::MASTER,
                    index: None,
                    effect: EffectSettings::new("amp"),
                })
                .unwrap();
        }
        let err = engine
            .apply(Command::InsertEffect {
                channel: ChannelId::MASTER,
                index: Some(0),
                effect: EffectSettings::new("amp"),
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::ChainFull(ChannelId::MASTER)));
    }

    #[test]
    fn test_move_effect_reports_noop() {
        let mut engine = engine();
        for kind in ["amp", "delay"] {
            engine
                .apply(Command::InsertEffect {
                    channel: ChannelId::MASTER,
                    index: None,
                    effect: EffectSettings::new(kind),
                })
                .unwrap();
        }
        assert_eq!(
            engine
                .apply(Command::MoveEffectUp {
                    channel: ChannelId::MASTER,
                    index: 0
                })
                .unwrap(),
            Applied::Moved(false)
        );
        assert_eq!(
            engine
                .apply(Command::MoveEffectUp {
                    channel: ChannelId::MASTER,
                    index: 1
                })
                .unwrap(),
            Applied::Moved(true)
        );
        let kinds: Vec<_> = engine
            .graph()
            .channel(ChannelId::MASTER)
            .unwrap()
            .effects
            .iter()
            .map(|e| e.kind.as_str())
            .collect();
        assert_eq!(kinds, ["delay", "amp"]);
    }

    #[test]
    fn test_track_errors() {
        let mut engine = engine();
        assert!(matches!(
            engine.apply(Command::RemoveTrack(TrackId(9))),
            Err(EngineError::TrackNotFound(TrackId(9)))
        ));
        assert!(matches!(
            engine.apply(Command::AddTrack {
                name: "x".into(),
                channel: ChannelId(42),
                instrument: None,
            }),
            Err(EngineError::Graph(GraphError::ChannelNotFound(_)))
        ));
        assert!(matches!(
            engine.apply(Command::AddTrack {
                name: "x".into(),
                channel: ChannelId::MASTER,
                instrument: Some("kazoo".into()),
            }),
            Err(EngineError::Load(_))
        ));

        let t = track(&mut engine, ChannelId::MASTER);
        assert!(matches!(
            engine.apply(Command::RemoveClip {
                track: t,
                lane: 0,
                index: 0
            }),
            Err(EngineError::ClipNotFound { .. })
        ));
    }

    #[test]
    fn test_overlapping_clip_goes_to_new_lane() {
        let mut engine = engine();
        let t = track(&mut engine, ChannelId::MASTER);
        let first = engine
            .apply(Command::AddClip {
                track: t,
                lane: None,
                clip: constant_clip(0.1),
            })
            .unwrap();
        let second = engine
            .apply(Command::AddClip {
                track: t,
                lane: None,
                clip: constant_clip(0.1),
            })
            .unwrap();
        assert_eq!(first, Applied::Clip { lane: 0, index: 0 });
        assert_eq!(second, Applied::Clip { lane: 1, index: 0 });
        assert!(engine
            .apply(Command::AddClip {
                track: t,
                lane: Some(0),
                clip: constant_clip(0.1),
            })
            .is_err());
    }

    #[test]
    fn test_back_to_back_transport_changes_each_notify() {
        let mut engine = engine();
        let rx = engine.subscribe();

        engine.apply(Command::Play).unwrap();
        engine.apply(Command::Stop).unwrap();
        engine.apply(Command::Play).unwrap();

        let changes: Vec<_> = rx
            .try_iter()
            .filter_map(|n| match n {
                Notification::TransportChanged(state) => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            changes,
            [
                TransportState::Playing,
                TransportState::Stopped,
                TransportState::Playing
            ]
        );

        // no state change, no notification
        engine.apply(Command::Seek(480)).unwrap();
        assert!(rx
            .try_iter()
            .all(|n| !matches!(n, Notification::TransportChanged(_))));
    }

    #[test]
    fn test_transport_commands_mirror_to_renderer() {
        let mut engine = engine();
        let handle = engine.handle();
        let rx = engine.subscribe();

        assert_eq!(
            engine.apply(Command::ToggleRecord).unwrap_err().to_string(),
            EngineError::Transport(mixbus_core::TransportError::NotRunning).to_string()
        );
        assert_eq!(
            engine.apply(Command::Play).unwrap(),
            Applied::Transport(TransportState::Playing)
        );
        assert_eq!(handle.transport_state(), TransportState::Playing);
        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::TransportChanged(TransportState::Playing)
        );

        engine.render_offline(128).unwrap();
        assert_eq!(handle.position(), 128);

        engine.apply(Command::Seek(1000)).unwrap();
        assert_eq!(handle.position(), 1000);

        engine.apply(Command::Stop).unwrap();
        assert_eq!(handle.position(), 0);
        assert_eq!(handle.transport_state(), TransportState::Stopped);
    }

    #[test]
    fn test_snapshot_tracks_versions() {
        let mut engine = engine();
        let handle = engine.handle();
        let before = handle.snapshot();
        let a = channel(&mut engine, "A");
        let after = handle.snapshot();

        assert!(after.version > before.version);
        assert_eq!(before.graph.len(), 1);
        assert!(after.graph.contains(a));
        assert_eq!(after.render_order.last(), Some(&ChannelId::MASTER));
    }

    #[test]
    fn test_stop_without_stream_is_noop() {
        let mut engine = engine();
        engine.stop().unwrap();
        engine.poll().unwrap();
        assert!(engine.backend_name().is_none());
    }

    #[test]
    fn test_slot_table_reuses_freed_slots() {
        let mut table = SlotTable::new(3);
        assert_eq!(table.allocate(ChannelId(0)), Some(0));
        assert_eq!(table.allocate(ChannelId(1)), Some(1));
        assert_eq!(table.release(ChannelId(0)), Some(0));
        assert_eq!(table.allocate(ChannelId(5)), Some(0));
        assert_eq!(table.slot_of(ChannelId(5)), Some(0));
        assert_eq!(table.pairs(), vec![(ChannelId(5), 0), (ChannelId(1), 1)]);
    }
}
