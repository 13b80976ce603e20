//! Mixer channel model.

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

use crate::chain::EffectSettings;

/// Stable channel identifier. Ids are never reused after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ChannelId(pub u32);

impl ChannelId {
    /// The master channel. Always present, always audible.
    pub const MASTER: ChannelId = ChannelId(0);

    /// Whether this is the master channel.
    pub fn is_master(self) -> bool {
        self == Self::MASTER
    }

    /// Index into id-addressed storage.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Maximum channel volume (linear, about +6 dB).
pub const MAX_VOLUME: f32 = 2.0;

/// Maximum send gain (linear).
pub const MAX_SEND_GAIN: f32 = 2.0;

// NaN falls back to the given value; `f32::clamp` would pass it through.
fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() { fallback } else { value.clamp(min, max) }
}

/// Clamp a volume to `0.0..=MAX_VOLUME`. NaN becomes unity.
pub(crate) fn clamp_volume(volume: f32) -> f32 {
    clamp_or(volume, 0.0, MAX_VOLUME, 1.0)
}

/// Clamp a pan to `-1.0..=1.0`. NaN becomes center.
pub(crate) fn clamp_pan(pan: f32) -> f32 {
    clamp_or(pan, -1.0, 1.0, 0.0)
}

/// Clamp a send gain to `0.0..=MAX_SEND_GAIN`. NaN becomes silence.
pub(crate) fn clamp_send_gain(gain: f32) -> f32 {
    clamp_or(gain, 0.0, MAX_SEND_GAIN, 0.0)
}

/// A gain-scaled route from one channel's output into another's input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSend {
    /// Destination channel.
    pub target: ChannelId,
    /// Linear send gain.
    pub gain: f32,
}

/// One mixing bus: volume, pan, mute/solo, effects and outgoing sends.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Channel id.
    pub id: ChannelId,
    /// Display name.
    pub name: String,
    /// Linear output gain, `0.0..=MAX_VOLUME`.
    pub volume: f32,
    /// Pan, `-1.0` (left) to `1.0` (right).
    pub pan: f32,
    /// Muted channels are silent and feed no sends.
    pub muted: bool,
    /// Soloed channels silence everything not connected to them.
    pub solo: bool,
    /// Effect chain settings in processing order.
    pub effects: Vec<EffectSettings>,
    pub(crate) sends: Vec<ChannelSend>,
}

impl Channel {
    /// Detached channel with unity volume, centered, no sends.
    ///
    /// Used to build channels for [`ChannelGraph::restore`](super::ChannelGraph::restore).
    pub fn new(id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            volume: 1.0,
            pan: 0.0,
            muted: false,
            solo: false,
            effects: Vec::new(),
            sends: Vec::new(),
        }
    }

    /// Add or replace an outgoing send. Validation happens on restore.
    pub fn with_send(mut self, target: ChannelId, gain: f32) -> Self {
        self.upsert_send(target, gain);
        self
    }

    /// Set the volume, clamped.
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = clamp_volume(volume);
        self
    }

    /// Set the pan, clamped.
    pub fn with_pan(mut self, pan: f32) -> Self {
        self.pan = clamp_pan(pan);
        self
    }

    /// Append an effect.
    pub fn with_effect(mut self, effect: EffectSettings) -> Self {
        self.effects.push(effect);
        self
    }

    /// Outgoing sends in insertion order.
    pub fn sends(&self) -> &[ChannelSend] {
        &self.sends
    }

    /// Gain of the send to `target`, if any.
    pub fn send_gain(&self, target: ChannelId) -> Option<f32> {
        self.sends.iter().find(|s| s.target == target).map(|s| s.gain)
    }

    pub(crate) fn upsert_send(&mut self, target: ChannelId, gain: f32) {
        let gain = clamp_send_gain(gain);
        match self.sends.iter_mut().find(|s| s.target == target) {
            Some(send) => send.gain = gain,
            None => self.sends.push(ChannelSend { target, gain }),
        }
    }

    /// Bring deserialized levels back into range.
    pub(crate) fn sanitize(&mut self) {
        self.volume = clamp_volume(self.volume);
        self.pan = clamp_pan(self.pan);
        for send in &mut self.sends {
            send.gain = clamp_send_gain(send.gain);
        }
    }

    pub(crate) fn take_send(&mut self, target: ChannelId) -> Option<ChannelSend> {
        let pos = self.sends.iter().position(|s| s.target == target)?;
        Some(self.sends.remove(pos))
    }
}
