//! Read-only session views for any thread.
//!
//! The engine publishes a fresh [`SessionSnapshot`] through `ArcSwap` after
//! every accepted command. Readers never block the control thread and always
//! see one consistent version of the session.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use arc_swap::ArcSwap;
use mixbus_core::{
    ChannelGraph, ChannelId, LoopRange, StopBehavior, Track, TrackId, Transport, TransportState,
};

use crate::shared::EngineShared;

/// Summary of one track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSummary {
    /// Track id.
    pub id: TrackId,
    /// Display name.
    pub name: String,
    /// Destination channel.
    pub channel: ChannelId,
    /// Linear gain.
    pub gain: f32,
    /// Muted.
    pub muted: bool,
    /// Instrument kind.
    pub instrument: Option<String>,
    /// Number of lanes.
    pub lanes: usize,
    /// Clips across all lanes.
    pub clips: usize,
    /// First tick after the last clip.
    pub end_tick: u64,
}

impl TrackSummary {
    fn of(track: &Track) -> Self {
        Self {
            id: track.id,
            name: track.name.clone(),
            channel: track.channel,
            gain: track.gain,
            muted: track.muted,
            instrument: track.instrument.clone(),
            lanes: track.lanes().len(),
            clips: track.lanes().iter().map(|l| l.clips().len()).sum(),
            end_tick: track.end_tick(),
        }
    }
}

/// Transport settings at snapshot time. The live playhead is on
/// [`SessionHandle::position`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportSummary {
    /// Tempo.
    pub bpm: f32,
    /// Loop region.
    pub loop_range: Option<LoopRange>,
    /// After-stop policy.
    pub stop_behavior: StopBehavior,
    /// Sample rate the session runs at.
    pub sample_rate: f32,
}

/// One consistent view of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Publication counter. A fresh engine publishes version 1 and every
    /// applied command bumps it.
    pub version: u64,
    /// Channels, sends and effect settings.
    pub graph: ChannelGraph,
    /// Tracks in creation order.
    pub tracks: Vec<TrackSummary>,
    /// Channel render order.
    pub render_order: Vec<ChannelId>,
    /// Transport settings.
    pub transport: TransportSummary,
    meter_slots: Vec<(ChannelId, usize)>,
}

impl SessionSnapshot {
    pub(crate) fn capture(
        version: u64,
        graph: &ChannelGraph,
        tracks: &[Track],
        transport: &Transport,
        meter_slots: Vec<(ChannelId, usize)>,
    ) -> Self {
        Self {
            version,
            graph: graph.clone(),
            tracks: tracks.iter().map(TrackSummary::of).collect(),
            render_order: graph.render_order(),
            transport: TransportSummary {
                bpm: transport.bpm(),
                loop_range: transport.loop_range(),
                stop_behavior: transport.stop_behavior(),
                sample_rate: transport.timing().sample_rate,
            },
            meter_slots,
        }
    }

    /// Number of effects on `channel` that failed to load.
    pub fn failed_effects(&self, channel: ChannelId) -> usize {
        self.graph
            .channel(channel)
            .map_or(0, |c| c.effects.iter().filter(|e| e.failed).count())
    }

    fn meter_slot(&self, channel: ChannelId) -> Option<usize> {
        self.meter_slots
            .iter()
            .find(|(id, _)| *id == channel)
            .map(|(_, slot)| *slot)
    }
}

/// Cloneable, thread-safe reader for snapshots, meters and the playhead.
///
/// ```rust
/// use mixbus_engine::{Command, Engine, EngineConfig};
///
/// let mut engine = Engine::new(EngineConfig::default());
/// let handle = engine.handle();
/// engine.apply(Command::AddChannel { name: "Drums".into() }).unwrap();
///
/// let reader = std::thread::spawn(move || handle.snapshot().graph.len());
/// assert_eq!(reader.join().unwrap(), 2);
/// ```
#[derive(Clone)]
pub struct SessionHandle {
    snapshot: Arc<ArcSwap<SessionSnapshot>>,
    shared: Arc<EngineShared>,
}

impl SessionHandle {
    pub(crate) fn new(snapshot: Arc<ArcSwap<SessionSnapshot>>, shared: Arc<EngineShared>) -> Self {
        Self { snapshot, shared }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.snapshot.load_full()
    }

    /// Playhead in frames.
    pub fn position(&self) -> u64 {
        self.shared.position.load(Ordering::Acquire)
    }

    /// Transport state as last seen by the audio thread.
    pub fn transport_state(&self) -> TransportState {
        self.shared.transport_state()
    }

    /// Post-fader peak of `channel` in the last rendered block.
    pub fn channel_peak(&self, channel: ChannelId) -> f32 {
        self.snapshot
            .load()
            .meter_slot(channel)
            .map_or(0.0, |slot| self.shared.slot_peak(slot))
    }

    /// Peak of the master output in the last rendered block.
    pub fn master_peak(&self) -> f32 {
        self.shared.master_peak.get()
    }

    /// Callbacks that missed their deadline so far.
    pub fn underruns(&self) -> u64 {
        self.shared.underruns.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("version", &self.snapshot.load().version)
            .field("position", &self.position())
            .finish_non_exhaustive()
    }
}
