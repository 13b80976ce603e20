//! Channel graph: mutation API, cycle rejection and render order.
//!
//! [`ChannelGraph`] owns the mixer model. It is mutated only by the control
//! thread; the audio thread receives [`RenderPlan`] snapshots compiled from
//! it. Channels live in id-indexed slots (`Vec<Option<Channel>>`), so ids
//! stay stable and are never compacted after a removal.

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec, vec::Vec};
use alloc::collections::BinaryHeap;
use core::cmp::Reverse;

use crate::chain::EffectSettings;

use super::channel::{Channel, ChannelId, clamp_pan, clamp_volume};
use super::plan::{PlanSend, PlanStep, RenderPlan};

/// A send would close a feedback loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleError {
    /// Source of the rejected send.
    pub from: ChannelId,
    /// Destination of the rejected send.
    pub to: ChannelId,
}

impl core::fmt::Display for CycleError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "send {} -> {} would create a feedback loop",
            self.from, self.to
        )
    }
}

impl core::error::Error for CycleError {}

/// Errors returned by channel graph operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Adding the send would create a cycle.
    Cycle(CycleError),
    /// No channel with this id.
    ChannelNotFound(ChannelId),
    /// No send between these channels.
    SendNotFound {
        /// Source channel.
        from: ChannelId,
        /// Destination channel.
        to: ChannelId,
    },
    /// The master channel cannot be removed.
    CannotRemoveMaster,
    /// Two restored channels share an id.
    DuplicateChannel(ChannelId),
    /// A restored graph has no master channel.
    MissingMaster,
    /// No effect at this index on the channel.
    EffectNotFound {
        /// Channel id.
        channel: ChannelId,
        /// Requested index.
        index: usize,
    },
}

impl core::fmt::Display for GraphError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Cycle(e) => write!(f, "{e}"),
            Self::ChannelNotFound(id) => write!(f, "channel {id} not found"),
            Self::SendNotFound { from, to } => write!(f, "no send from {from} to {to}"),
            Self::CannotRemoveMaster => write!(f, "the master channel cannot be removed"),
            Self::DuplicateChannel(id) => write!(f, "channel {id} defined more than once"),
            Self::MissingMaster => write!(f, "graph has no master channel"),
            Self::EffectNotFound { channel, index } => {
                write!(f, "channel {channel} has no effect at index {index}")
            }
        }
    }
}

impl core::error::Error for GraphError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Cycle(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CycleError> for GraphError {
    fn from(e: CycleError) -> Self {
        Self::Cycle(e)
    }
}

/// Routing graph of mixer channels.
///
/// # Example
///
/// ```rust
/// use mixbus_core::graph::{ChannelGraph, ChannelId, GraphError};
///
/// let mut graph = ChannelGraph::new();
/// let a = graph.add_channel("A");
/// let b = graph.add_channel("B");
/// assert_eq!(graph.render_order(), vec![a, b, ChannelId::MASTER]);
///
/// let err = graph.add_send(ChannelId::MASTER, a, 1.0).unwrap_err();
/// assert!(matches!(err, GraphError::Cycle(_)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelGraph {
    channels: Vec<Option<Channel>>,
    next_id: u32,
}

impl Default for ChannelGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelGraph {
    /// Graph containing only the master channel.
    pub fn new() -> Self {
        Self {
            channels: vec![Some(Channel::new(ChannelId::MASTER, "Master"))],
            next_id: 1,
        }
    }

    /// Rebuild a graph from persisted channels.
    ///
    /// Checks for a master channel, duplicate ids, dangling or self sends and
    /// cycles. On success the next allocated id follows the largest restored
    /// id.
    pub fn restore(channels: impl IntoIterator<Item = Channel>) -> Result<Self, GraphError> {
        let mut graph = Self {
            channels: Vec::new(),
            next_id: 1,
        };
        for mut channel in channels {
            let idx = channel.id.index();
            if idx >= graph.channels.len() {
                graph.channels.resize_with(idx + 1, || None);
            }
            if graph.channels[idx].is_some() {
                return Err(GraphError::DuplicateChannel(channel.id));
            }
            channel.sanitize();
            graph.next_id = graph.next_id.max(channel.id.0 + 1);
            graph.channels[idx] = Some(channel);
        }
        if graph.get(ChannelId::MASTER).is_err() {
            return Err(GraphError::MissingMaster);
        }

        for channel in graph.channels.iter().flatten() {
            for send in channel.sends() {
                if send.target == channel.id {
                    return Err(CycleError {
                        from: channel.id,
                        to: send.target,
                    }
                    .into());
                }
                graph.get(send.target)?;
            }
        }

        if let Some((from, to)) = graph.find_cycle_edge() {
            return Err(CycleError { from, to }.into());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(channels = graph.len(), "graph_restore");
        Ok(graph)
    }

    /// Add a channel routed to master at unity gain.
    pub fn add_channel(&mut self, name: impl Into<String>) -> ChannelId {
        let id = ChannelId(self.next_id);
        self.next_id += 1;
        let channel = Channel::new(id, name).with_send(ChannelId::MASTER, 1.0);
        let idx = id.index();
        if idx >= self.channels.len() {
            self.channels.resize_with(idx + 1, || None);
        }
        self.channels[idx] = Some(channel);
        #[cfg(feature = "tracing")]
        tracing::debug!(%id, "graph_add_channel");
        id
    }

    /// Remove a channel and every send that references it.
    ///
    /// Returns the removed channel. Callers that route tracks to channels
    /// must move them to master.
    pub fn remove_channel(&mut self, id: ChannelId) -> Result<Channel, GraphError> {
        if id.is_master() {
            return Err(GraphError::CannotRemoveMaster);
        }
        self.get(id)?;
        let removed = self.channels[id.index()]
            .take()
            .ok_or(GraphError::ChannelNotFound(id))?;
        for channel in self.channels.iter_mut().flatten() {
            channel.take_send(id);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(%id, "graph_remove_channel");
        Ok(removed)
    }

    /// Insert a send or update its gain.
    ///
    /// Fails with [`GraphError::Cycle`] when `from == to` or when `to`
    /// already reaches `from`; the graph is left unchanged.
    pub fn add_send(&mut self, from: ChannelId, to: ChannelId, gain: f32) -> Result<(), GraphError> {
        self.get(from)?;
        self.get(to)?;
        if from == to || self.reaches(to, from) {
            return Err(CycleError { from, to }.into());
        }
        self.get_mut(from)?.upsert_send(to, gain);
        #[cfg(feature = "tracing")]
        tracing::debug!(%from, %to, gain, "graph_add_send");
        Ok(())
    }

    /// Remove a send, returning its gain.
    pub fn remove_send(&mut self, from: ChannelId, to: ChannelId) -> Result<f32, GraphError> {
        let send = self
            .get_mut(from)?
            .take_send(to)
            .ok_or(GraphError::SendNotFound { from, to })?;
        Ok(send.gain)
    }

    /// Gain of the send `from -> to`, if present.
    pub fn send_gain(&self, from: ChannelId, to: ChannelId) -> Option<f32> {
        self.channel(from)?.send_gain(to)
    }

    /// Whether a path of sends leads from `from` to `to`.
    ///
    /// A channel reaches itself.
    pub fn reaches(&self, from: ChannelId, to: ChannelId) -> bool {
        let mut visited = vec![false; self.channels.len()];
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            let idx = current.index();
            if idx >= visited.len() || visited[idx] {
                continue;
            }
            visited[idx] = true;
            if let Some(Some(channel)) = self.channels.get(idx) {
                stack.extend(channel.sends().iter().map(|s| s.target));
            }
        }
        false
    }

    /// Topological render order, sources first.
    ///
    /// Among channels that are ready at the same time, the lowest id goes
    /// first, so the order is deterministic.
    pub fn render_order(&self) -> Vec<ChannelId> {
        let mut in_degree = vec![0usize; self.channels.len()];
        for channel in self.channels.iter().flatten() {
            for send in channel.sends() {
                in_degree[send.target.index()] += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<ChannelId>> = self
            .channels
            .iter()
            .flatten()
            .filter(|c| in_degree[c.id.index()] == 0)
            .map(|c| Reverse(c.id))
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            if let Some(Some(channel)) = self.channels.get(id.index()) {
                for send in channel.sends() {
                    let d = &mut in_degree[send.target.index()];
                    *d -= 1;
                    if *d == 0 {
                        ready.push(Reverse(send.target));
                    }
                }
            }
        }
        order
    }

    /// Whether `id` is heard given the current mute and solo flags.
    pub fn is_audible(&self, id: ChannelId) -> bool {
        self.audibility().get(id.index()).copied().unwrap_or(false)
    }

    /// Compile an immutable render snapshot.
    ///
    /// `slot_of` maps channel ids to renderer strip slots; channels without
    /// a slot are left out of the plan, as are sends into them.
    pub fn compile(&self, slot_of: impl Fn(ChannelId) -> Option<usize>) -> RenderPlan {
        let audible = self.audibility();
        let mut steps = Vec::with_capacity(self.len());
        for id in self.render_order() {
            let (Some(channel), Some(slot)) = (self.channel(id), slot_of(id)) else {
                continue;
            };
            let sends = channel
                .sends()
                .iter()
                .filter_map(|s| {
                    slot_of(s.target).map(|target| PlanSend {
                        slot: target,
                        gain: s.gain,
                    })
                })
                .collect();
            steps.push(PlanStep {
                channel: id,
                slot,
                volume: channel.volume,
                pan: channel.pan,
                audible: audible[id.index()],
                sends,
            });
        }
        RenderPlan::new(steps, slot_of(ChannelId::MASTER))
    }

    /// Channel by id.
    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(id.index()).and_then(Option::as_ref)
    }

    /// Channels in ascending id order.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().flatten()
    }

    /// Number of channels, master included.
    pub fn len(&self) -> usize {
        self.channels.iter().flatten().count()
    }

    /// Always `false`: master is never removed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a channel with this id exists.
    pub fn contains(&self, id: ChannelId) -> bool {
        self.channel(id).is_some()
    }

    /// Rename a channel.
    pub fn set_name(&mut self, id: ChannelId, name: impl Into<String>) -> Result<(), GraphError> {
        self.get_mut(id)?.name = name.into();
        Ok(())
    }

    /// Set channel volume, clamped to `0.0..=MAX_VOLUME`. NaN resets to unity.
    pub fn set_volume(&mut self, id: ChannelId, volume: f32) -> Result<(), GraphError> {
        self.get_mut(id)?.volume = clamp_volume(volume);
        Ok(())
    }

    /// Set channel pan, clamped to `-1.0..=1.0`. NaN resets to center.
    pub fn set_pan(&mut self, id: ChannelId, pan: f32) -> Result<(), GraphError> {
        self.get_mut(id)?.pan = clamp_pan(pan);
        Ok(())
    }

    /// Mute or unmute a channel.
    pub fn set_muted(&mut self, id: ChannelId, muted: bool) -> Result<(), GraphError> {
        self.get_mut(id)?.muted = muted;
        Ok(())
    }

    /// Solo or unsolo a channel.
    pub fn set_solo(&mut self, id: ChannelId, solo: bool) -> Result<(), GraphError> {
        self.get_mut(id)?.solo = solo;
        Ok(())
    }

    /// Insert effect settings at `index` (clamped). Returns the final index.
    pub fn insert_effect(
        &mut self,
        id: ChannelId,
        index: usize,
        effect: EffectSettings,
    ) -> Result<usize, GraphError> {
        let effects = &mut self.get_mut(id)?.effects;
        let index = index.min(effects.len());
        effects.insert(index, effect);
        Ok(index)
    }

    /// Remove effect settings at `index`.
    pub fn remove_effect(&mut self, id: ChannelId, index: usize) -> Result<EffectSettings, GraphError> {
        let effects = &mut self.get_mut(id)?.effects;
        if index >= effects.len() {
            return Err(GraphError::EffectNotFound { channel: id, index });
        }
        Ok(effects.remove(index))
    }

    /// Swap the effect at `index` with its predecessor.
    pub fn move_effect_up(&mut self, id: ChannelId, index: usize) -> Result<bool, GraphError> {
        let effects = &mut self.get_mut(id)?.effects;
        if index == 0 || index >= effects.len() {
            return Ok(false);
        }
        effects.swap(index - 1, index);
        Ok(true)
    }

    /// Swap the effect at `index` with its successor.
    pub fn move_effect_down(&mut self, id: ChannelId, index: usize) -> Result<bool, GraphError> {
        let effects = &mut self.get_mut(id)?.effects;
        if index + 1 >= effects.len() {
            return Ok(false);
        }
        effects.swap(index, index + 1);
        Ok(true)
    }

    /// Mutable effect settings.
    pub fn effect_mut(&mut self, id: ChannelId, index: usize) -> Result<&mut EffectSettings, GraphError> {
        self.get_mut(id)?
            .effects
            .get_mut(index)
            .ok_or(GraphError::EffectNotFound { channel: id, index })
    }

    fn get(&self, id: ChannelId) -> Result<&Channel, GraphError> {
        self.channel(id).ok_or(GraphError::ChannelNotFound(id))
    }

    fn get_mut(&mut self, id: ChannelId) -> Result<&mut Channel, GraphError> {
        self.channels
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(GraphError::ChannelNotFound(id))
    }

    /// Per-id audibility. Unused ids are `false`.
    fn audibility(&self) -> Vec<bool> {
        let n = self.channels.len();
        let soloed: Vec<ChannelId> = self.channels().filter(|c| c.solo).map(|c| c.id).collect();

        let mut audible = vec![false; n];
        if soloed.is_empty() {
            for c in self.channels() {
                audible[c.id.index()] = true;
            }
        } else {
            let down = self.closure(&soloed, true);
            let up = self.closure(&soloed, false);
            for c in self.channels() {
                let i = c.id.index();
                audible[i] = c.id.is_master() || down[i] || up[i];
            }
        }
        for c in self.channels() {
            if c.muted {
                audible[c.id.index()] = false;
            }
        }
        audible
    }

    /// Channels reachable from `start` along sends (`forward`) or against
    /// them (`!forward`), including `start` itself.
    fn closure(&self, start: &[ChannelId], forward: bool) -> Vec<bool> {
        let mut seen = vec![false; self.channels.len()];
        let mut stack: Vec<ChannelId> = start.to_vec();
        while let Some(id) = stack.pop() {
            if seen[id.index()] {
                continue;
            }
            seen[id.index()] = true;
            if forward {
                if let Some(c) = self.channel(id) {
                    stack.extend(c.sends().iter().map(|s| s.target));
                }
            } else {
                for c in self.channels() {
                    if c.sends().iter().any(|s| s.target == id) {
                        stack.push(c.id);
                    }
                }
            }
        }
        seen
    }

    /// Some edge that lies on a cycle, if the graph has one.
    fn find_cycle_edge(&self) -> Option<(ChannelId, ChannelId)> {
        if self.render_order().len() == self.len() {
            return None;
        }
        self.channels().find_map(|c| {
            c.sends()
                .iter()
                .find(|s| self.reaches(s.target, c.id))
                .map(|s| (c.id, s.target))
        })
    }
}
