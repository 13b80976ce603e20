//! Per-channel effect chains.
//!
//! An [`EffectChain`] is an ordered list of [`EffectSlot`]s applied serially
//! to a channel's stereo buffer. Each slot owns one effect instance plus the
//! mixing state around it:
//!
//! - **enabled**: disabled slots pass audio through untouched.
//! - **wet/dry**: `out = (1 - wet_dry) * in + wet_dry * effect(in)`.
//! - **auto-shutoff**: after `decay_ms` of consecutive buffers where both
//!   input and output peak stay at or below the gate, the slot goes to sleep
//!   and stops calling its effect. The first buffer whose input rises above
//!   the gate wakes it again. A sleeping slot passes its (silent) input
//!   through, so the audible result is unchanged.
//! - **failed**: a slot whose effect could not be created has no effect
//!   instance and behaves like a permanently bypassed slot.
//!
//! [`EffectSettings`] is the model-side description of a slot (kind id,
//! mixing state and the parameter map keyed by `string_id`). It is what gets
//! persisted and what the control thread edits; slots are built from it.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, string::String, vec::Vec};
use alloc::collections::BTreeMap;

use crate::buffer::StereoBuffer;
use crate::effect::Effect;
use crate::effect_with_params::EffectWithParams;
use crate::math::db_to_linear;

/// Default gate threshold for auto-shutoff.
pub const DEFAULT_GATE_DB: f32 = -60.0;

/// Default silence time before a slot sleeps.
pub const DEFAULT_DECAY_MS: f32 = 500.0;

/// Slots reserved per chain so inserts on the audio thread do not allocate.
pub const MAX_CHAIN_LEN: usize = 32;

/// Model-side description of one effect instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSettings {
    /// Registry id of the effect type (e.g. `"delay"`).
    pub kind: String,
    /// Whether the slot processes audio.
    pub enabled: bool,
    /// Wet/dry ratio in `[0, 1]`.
    pub wet_dry: f32,
    /// Auto-shutoff gate in dB.
    pub gate_db: f32,
    /// Silence time before auto-shutoff, in milliseconds.
    pub decay_ms: f32,
    /// Whether auto-shutoff is active.
    pub auto_shutoff: bool,
    /// Set when the effect could not be loaded.
    pub failed: bool,
    /// Effect parameters keyed by descriptor `string_id`.
    pub params: BTreeMap<String, f32>,
}

impl EffectSettings {
    /// Settings for a fresh instance of `kind` with default mixing state.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            enabled: true,
            wet_dry: 1.0,
            gate_db: DEFAULT_GATE_DB,
            decay_ms: DEFAULT_DECAY_MS,
            auto_shutoff: true,
            failed: false,
            params: BTreeMap::new(),
        }
    }

    /// Set a parameter value.
    pub fn with_param(mut self, string_id: impl Into<String>, value: f32) -> Self {
        self.params.insert(string_id.into(), value);
        self
    }

    /// Set the wet/dry ratio, clamped to `[0, 1]`.
    pub fn with_wet_dry(mut self, wet_dry: f32) -> Self {
        self.wet_dry = wet_dry.clamp(0.0, 1.0);
        self
    }

    /// Set the auto-shutoff gate and decay.
    pub fn with_shutoff(mut self, gate_db: f32, decay_ms: f32) -> Self {
        self.gate_db = gate_db;
        self.decay_ms = decay_ms.max(0.0);
        self
    }

    /// Fill missing parameters from an effect's current values.
    ///
    /// Values already present are kept; keys the effect does not know are
    /// left in place so a failed or newer plugin keeps its saved state.
    pub fn capture_defaults(&mut self, effect: &dyn EffectWithParams) {
        for i in 0..effect.effect_param_count() {
            if let Some(desc) = effect.effect_param_info(i)
                && !desc.string_id.is_empty()
            {
                self.params
                    .entry(String::from(desc.string_id))
                    .or_insert_with(|| effect.effect_get_param(i));
            }
        }
    }
}

/// One effect instance with its wet/dry, bypass and auto-shutoff state.
pub struct EffectSlot {
    kind: String,
    effect: Option<Box<dyn EffectWithParams + Send>>,
    enabled: bool,
    wet_dry: f32,
    gate: f32,
    decay_ms: f32,
    auto_shutoff: bool,
    sleeping: bool,
    quiet_frames: u64,
    sample_rate: f32,
    wet: StereoBuffer,
}

impl EffectSlot {
    /// Active slot around `effect`, with scratch space for `max_block` frames.
    pub fn new(
        kind: impl Into<String>,
        effect: Box<dyn EffectWithParams + Send>,
        sample_rate: f32,
        max_block: usize,
    ) -> Self {
        Self {
            kind: kind.into(),
            effect: Some(effect),
            enabled: true,
            wet_dry: 1.0,
            gate: db_to_linear(DEFAULT_GATE_DB),
            decay_ms: DEFAULT_DECAY_MS,
            auto_shutoff: true,
            sleeping: false,
            quiet_frames: 0,
            sample_rate,
            wet: StereoBuffer::new(max_block),
        }
    }

    /// Slot whose effect failed to load. It passes audio through.
    pub fn failed(kind: impl Into<String>, sample_rate: f32) -> Self {
        Self {
            kind: kind.into(),
            effect: None,
            enabled: true,
            wet_dry: 1.0,
            gate: db_to_linear(DEFAULT_GATE_DB),
            decay_ms: DEFAULT_DECAY_MS,
            auto_shutoff: true,
            sleeping: false,
            quiet_frames: 0,
            sample_rate,
            wet: StereoBuffer::default(),
        }
    }

    /// Build a slot from model settings.
    ///
    /// `effect` is `None` when loading failed. Parameters are applied by
    /// `string_id`; unknown keys are ignored.
    pub fn from_settings(
        settings: &EffectSettings,
        effect: Option<Box<dyn EffectWithParams + Send>>,
        sample_rate: f32,
        max_block: usize,
    ) -> Self {
        let mut slot = match effect {
            Some(effect) => Self::new(settings.kind.clone(), effect, sample_rate, max_block),
            None => Self::failed(settings.kind.clone(), sample_rate),
        };
        slot.enabled = settings.enabled;
        slot.set_wet_dry(settings.wet_dry);
        slot.set_gate_db(settings.gate_db);
        slot.set_decay_ms(settings.decay_ms);
        slot.auto_shutoff = settings.auto_shutoff;
        for (key, value) in &settings.params {
            slot.set_param_by_id(key, *value);
        }
        slot
    }

    /// Registry id of the effect type.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Whether the effect failed to load.
    pub fn is_failed(&self) -> bool {
        self.effect.is_none()
    }

    /// Whether auto-shutoff has put the slot to sleep.
    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Whether the slot is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or bypass the slot.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.sleeping = false;
            self.quiet_frames = 0;
        }
    }

    /// Wet/dry ratio.
    pub fn wet_dry(&self) -> f32 {
        self.wet_dry
    }

    /// Set the wet/dry ratio, clamped to `[0, 1]`.
    pub fn set_wet_dry(&mut self, wet_dry: f32) {
        self.wet_dry = wet_dry.clamp(0.0, 1.0);
    }

    /// Set the auto-shutoff gate in dB.
    pub fn set_gate_db(&mut self, gate_db: f32) {
        self.gate = db_to_linear(gate_db);
    }

    /// Set the auto-shutoff decay in milliseconds.
    pub fn set_decay_ms(&mut self, decay_ms: f32) {
        self.decay_ms = decay_ms.max(0.0);
    }

    /// Turn auto-shutoff on or off. Turning it off wakes the slot.
    pub fn set_auto_shutoff(&mut self, on: bool) {
        self.auto_shutoff = on;
        if !on {
            self.sleeping = false;
            self.quiet_frames = 0;
        }
    }

    /// The effect instance, unless loading failed.
    pub fn effect(&self) -> Option<&(dyn EffectWithParams + Send)> {
        self.effect.as_deref()
    }

    /// Mutable effect instance, unless loading failed.
    pub fn effect_mut(&mut self) -> Option<&mut (dyn EffectWithParams + Send + 'static)> {
        self.effect.as_deref_mut()
    }

    /// Set a parameter by index. Ignored on failed slots.
    pub fn set_param(&mut self, index: usize, value: f32) {
        if let Some(effect) = self.effect.as_mut() {
            effect.effect_set_param(index, value);
        }
    }

    /// Set a parameter by `string_id`. Returns `false` if no such parameter.
    pub fn set_param_by_id(&mut self, string_id: &str, value: f32) -> bool {
        let Some(effect) = self.effect.as_mut() else {
            return false;
        };
        match effect.effect_param_index(string_id) {
            Some(index) => {
                effect.effect_set_param(index, value);
                true
            }
            None => false,
        }
    }

    /// Run the slot over `buffer` in place.
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        if !self.enabled || buffer.is_empty() {
            return;
        }
        let Some(effect) = self.effect.as_mut() else {
            return;
        };

        let input_peak = buffer.peak();
        if self.sleeping {
            if input_peak <= self.gate {
                return;
            }
            self.sleeping = false;
            self.quiet_frames = 0;
        }

        self.wet.resize(buffer.len());
        self.wet.copy_from(buffer);
        effect.process_block_stereo(&mut self.wet.left, &mut self.wet.right);

        let mix = self.wet_dry;
        let dry = 1.0 - mix;
        for (d, w) in buffer.left.iter_mut().zip(self.wet.left.iter()) {
            *d = *d * dry + *w * mix;
        }
        for (d, w) in buffer.right.iter_mut().zip(self.wet.right.iter()) {
            *d = *d * dry + *w * mix;
        }

        if !self.auto_shutoff {
            return;
        }
        if input_peak <= self.gate && buffer.peak() <= self.gate {
            self.quiet_frames += buffer.len() as u64;
            let quiet_ms = self.quiet_frames as f32 * 1000.0 / self.sample_rate;
            if quiet_ms > self.decay_ms {
                self.sleeping = true;
            }
        } else {
            self.quiet_frames = 0;
        }
    }

    /// Propagate a sample rate change to the effect.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        if let Some(effect) = self.effect.as_mut() {
            effect.set_sample_rate(sample_rate);
        }
    }

    /// Clear effect state and wake the slot.
    pub fn reset(&mut self) {
        self.sleeping = false;
        self.quiet_frames = 0;
        if let Some(effect) = self.effect.as_mut() {
            effect.reset();
        }
    }
}

impl core::fmt::Debug for EffectSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EffectSlot")
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("failed", &self.is_failed())
            .field("sleeping", &self.sleeping)
            .field("wet_dry", &self.wet_dry)
            .finish_non_exhaustive()
    }
}

/// Ordered effect slots applied serially to a buffer.
#[derive(Debug)]
pub struct EffectChain {
    slots: Vec<EffectSlot>,
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectChain {
    /// Empty chain with [`MAX_CHAIN_LEN`] slots reserved.
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(MAX_CHAIN_LEN),
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the chain has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Append a slot.
    pub fn push(&mut self, slot: EffectSlot) {
        self.slots.push(slot);
    }

    /// Insert a slot at `index`, clamped to the chain length.
    pub fn insert(&mut self, index: usize, slot: EffectSlot) {
        let index = index.min(self.slots.len());
        self.slots.insert(index, slot);
    }

    /// Remove and return the slot at `index`.
    pub fn remove(&mut self, index: usize) -> Option<EffectSlot> {
        (index < self.slots.len()).then(|| self.slots.remove(index))
    }

    /// Swap the slot at `index` with its predecessor.
    pub fn move_up(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.slots.len() {
            return false;
        }
        self.slots.swap(index - 1, index);
        true
    }

    /// Swap the slot at `index` with its successor.
    pub fn move_down(&mut self, index: usize) -> bool {
        if index + 1 >= self.slots.len() {
            return false;
        }
        self.slots.swap(index, index + 1);
        true
    }

    /// Slot at `index`.
    pub fn slot(&self, index: usize) -> Option<&EffectSlot> {
        self.slots.get(index)
    }

    /// Mutable slot at `index`.
    pub fn slot_mut(&mut self, index: usize) -> Option<&mut EffectSlot> {
        self.slots.get_mut(index)
    }

    /// All slots in processing order.
    pub fn slots(&self) -> &[EffectSlot] {
        &self.slots
    }

    /// Number of slots that are enabled and loaded.
    pub fn enabled_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.is_enabled() && !s.is_failed())
            .count()
    }

    /// Run every slot over `buffer` in order.
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        for slot in &mut self.slots {
            slot.process(buffer);
        }
    }

    /// Propagate a sample rate change.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        for slot in &mut self.slots {
            slot.set_sample_rate(sample_rate);
        }
    }

    /// Reset every slot.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.reset();
        }
    }

    /// Total reported latency of enabled, loaded slots.
    pub fn latency_samples(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.is_enabled())
            .filter_map(|s| s.effect())
            .map(|e| e.latency_samples())
            .sum()
    }
}
