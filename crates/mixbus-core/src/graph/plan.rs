//! Immutable render snapshot handed to the audio thread.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use super::channel::ChannelId;

/// A send resolved to a renderer strip slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanSend {
    /// Destination strip slot.
    pub slot: usize,
    /// Linear send gain.
    pub gain: f32,
}

/// One channel in render order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    /// Channel id.
    pub channel: ChannelId,
    /// Renderer strip slot holding the channel's buffer and chain.
    pub slot: usize,
    /// Linear output gain.
    pub volume: f32,
    /// Pan in `[-1, 1]`.
    pub pan: f32,
    /// `false` when muted or silenced by solo.
    pub audible: bool,
    /// Outgoing sends.
    pub sends: Vec<PlanSend>,
}

/// Topologically ordered render steps plus the master slot.
///
/// The renderer walks `steps` front to back: every step's input is complete
/// by the time it is reached, because all of its sources come earlier.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderPlan {
    steps: Vec<PlanStep>,
    master_slot: Option<usize>,
}

impl RenderPlan {
    /// Plan from ordered steps.
    pub fn new(steps: Vec<PlanStep>, master_slot: Option<usize>) -> Self {
        Self { steps, master_slot }
    }

    /// Plan that renders nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Steps in render order.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Strip slot of the master channel.
    pub fn master_slot(&self) -> Option<usize> {
        self.master_slot
    }

    /// Channel ids in render order.
    pub fn order(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.steps.iter().map(|s| s.channel)
    }
}
