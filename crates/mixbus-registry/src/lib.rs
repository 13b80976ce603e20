//! Effect and instrument factories for mixbus.
//!
//! Channels never name concrete effect types. They hold a kind id
//! (`"delay"`, `"filter"`, ...) and ask the [`EffectRegistry`] for an
//! instance. Each kind is backed by a factory behind one of two capability
//! traits:
//!
//! - [`EffectFactory`] builds `Box<dyn EffectWithParams + Send>` for effect
//!   slots.
//! - [`InstrumentFactory`] builds `Box<dyn Instrument + Send>` for tracks
//!   with note clips.
//!
//! Built-in effects are registered by [`EffectRegistry::new`]. External
//! modules add their own factories at runtime with
//! [`EffectRegistry::register_effect`]; a factory that fails to load
//! returns [`LoadError`] and the caller keeps a bypassed slot in its place.
//!
//! # Example
//!
//! ```rust
//! use mixbus_registry::{EffectCategory, EffectRegistry};
//!
//! let registry = EffectRegistry::new();
//! for effect in registry.all_effects() {
//!     println!("{}: {}", effect.id, effect.description);
//! }
//!
//! let delay = registry.create("delay", 48000.0).unwrap();
//! assert_eq!(delay.effect_param_count(), 3);
//! assert!(registry.create("nonexistent", 48000.0).is_err());
//! assert_eq!(registry.effects_in_category(EffectCategory::Filter).len(), 1);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(not(feature = "std"))]
use alloc::{borrow::ToOwned, boxed::Box, string::String, vec::Vec};

use mixbus_core::{EffectWithParams, Instrument, ParamDescriptor};
use mixbus_effects::{Amp, Delay, Distortion, Filter, Tone};

/// Category used for listing and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectCategory {
    /// Gain stages and panning.
    Utility,
    /// Delays.
    TimeBased,
    /// Filters.
    Filter,
    /// Distortion and saturation.
    Distortion,
    /// Note-driven sound sources.
    Instrument,
}

impl EffectCategory {
    /// Display name.
    pub const fn name(&self) -> &'static str {
        match self {
            EffectCategory::Utility => "Utility",
            EffectCategory::TimeBased => "Time-Based",
            EffectCategory::Filter => "Filter",
            EffectCategory::Distortion => "Distortion",
            EffectCategory::Instrument => "Instrument",
        }
    }
}

/// Metadata for one registered kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectDescriptor {
    /// Kind id stored in projects (lowercase, no spaces).
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Category.
    pub category: EffectCategory,
    /// Number of parameters.
    pub param_count: usize,
}

/// Failure to produce an effect or instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// No effect registered under this id.
    UnknownEffect(String),
    /// No instrument registered under this id.
    UnknownInstrument(String),
    /// The factory exists but could not build an instance.
    Failed {
        /// Kind id.
        id: String,
        /// Factory-supplied reason.
        reason: String,
    },
}

impl LoadError {
    /// Factory failure for `id`.
    pub fn failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl core::fmt::Display for LoadError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownEffect(id) => write!(f, "unknown effect '{id}'"),
            Self::UnknownInstrument(id) => write!(f, "unknown instrument '{id}'"),
            Self::Failed { id, reason } => write!(f, "failed to load '{id}': {reason}"),
        }
    }
}

impl core::error::Error for LoadError {}

/// Builds effect instances of one kind.
pub trait EffectFactory: Send + Sync {
    /// Metadata for this kind.
    fn descriptor(&self) -> &EffectDescriptor;

    /// Build an instance at `sample_rate`.
    fn create(&self, sample_rate: f32) -> Result<Box<dyn EffectWithParams + Send>, LoadError>;
}

/// Builds instrument instances of one kind.
pub trait InstrumentFactory: Send + Sync {
    /// Metadata for this kind.
    fn descriptor(&self) -> &EffectDescriptor;

    /// Build an instance at `sample_rate`.
    fn create(&self, sample_rate: f32) -> Result<Box<dyn Instrument + Send>, LoadError>;
}

/// Factory backed by a constructor function. Used for the built-ins.
pub struct BuiltinEffect {
    descriptor: EffectDescriptor,
    build: fn(f32) -> Box<dyn EffectWithParams + Send>,
}

impl BuiltinEffect {
    /// Wrap a constructor.
    pub const fn new(
        descriptor: EffectDescriptor,
        build: fn(f32) -> Box<dyn EffectWithParams + Send>,
    ) -> Self {
        Self { descriptor, build }
    }
}

impl EffectFactory for BuiltinEffect {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn create(&self, sample_rate: f32) -> Result<Box<dyn EffectWithParams + Send>, LoadError> {
        Ok((self.build)(sample_rate))
    }
}

/// Instrument factory backed by a constructor function.
pub struct BuiltinInstrument {
    descriptor: EffectDescriptor,
    build: fn(f32) -> Box<dyn Instrument + Send>,
}

impl BuiltinInstrument {
    /// Wrap a constructor.
    pub const fn new(descriptor: EffectDescriptor, build: fn(f32) -> Box<dyn Instrument + Send>) -> Self {
        Self { descriptor, build }
    }
}

impl InstrumentFactory for BuiltinInstrument {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn create(&self, sample_rate: f32) -> Result<Box<dyn Instrument + Send>, LoadError> {
        Ok((self.build)(sample_rate))
    }
}

/// Registry of effect and instrument factories.
pub struct EffectRegistry {
    effects: Vec<Box<dyn EffectFactory>>,
    instruments: Vec<Box<dyn InstrumentFactory>>,
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("effects", &self.effects.iter().map(|e| e.descriptor().id).collect::<Vec<_>>())
            .field(
                "instruments",
                &self.instruments.iter().map(|e| e.descriptor().id).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl EffectRegistry {
    /// Registry with the built-in effects and instruments.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        registry
    }

    /// Registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            effects: Vec::new(),
            instruments: Vec::new(),
        }
    }

    fn register_builtins(&mut self) {
        self.register_effect(Box::new(BuiltinEffect::new(
            EffectDescriptor {
                id: "amp",
                name: "Amp",
                description: "Gain and pan stage",
                category: EffectCategory::Utility,
                param_count: 2,
            },
            |sr| Box::new(Amp::new(sr)),
        )));
        self.register_effect(Box::new(BuiltinEffect::new(
            EffectDescriptor {
                id: "delay",
                name: "Delay",
                description: "Stereo feedback delay",
                category: EffectCategory::TimeBased,
                param_count: 3,
            },
            |sr| Box::new(Delay::new(sr)),
        )));
        self.register_effect(Box::new(BuiltinEffect::new(
            EffectDescriptor {
                id: "filter",
                name: "Filter",
                description: "Resonant lowpass, highpass or bandpass filter",
                category: EffectCategory::Filter,
                param_count: 3,
            },
            |sr| Box::new(Filter::new(sr)),
        )));
        self.register_effect(Box::new(BuiltinEffect::new(
            EffectDescriptor {
                id: "distortion",
                name: "Distortion",
                description: "Soft or hard waveshaping distortion",
                category: EffectCategory::Distortion,
                param_count: 3,
            },
            |sr| Box::new(Distortion::new(sr)),
        )));
        self.register_instrument(Box::new(BuiltinInstrument::new(
            EffectDescriptor {
                id: "tone",
                name: "Tone",
                description: "Polyphonic sine instrument",
                category: EffectCategory::Instrument,
                param_count: 0,
            },
            |sr| Box::new(Tone::new(sr)),
        )));
    }

    /// Register an effect factory. Replaces any factory with the same id.
    pub fn register_effect(&mut self, factory: Box<dyn EffectFactory>) {
        let id = factory.descriptor().id;
        match self.effects.iter().position(|f| f.descriptor().id == id) {
            Some(i) => self.effects[i] = factory,
            None => self.effects.push(factory),
        }
    }

    /// Register an instrument factory. Replaces any factory with the same id.
    pub fn register_instrument(&mut self, factory: Box<dyn InstrumentFactory>) {
        let id = factory.descriptor().id;
        match self.instruments.iter().position(|f| f.descriptor().id == id) {
            Some(i) => self.instruments[i] = factory,
            None => self.instruments.push(factory),
        }
    }

    /// Descriptors of all effects, in registration order.
    pub fn all_effects(&self) -> Vec<&EffectDescriptor> {
        self.effects.iter().map(|f| f.descriptor()).collect()
    }

    /// Descriptors of all instruments.
    pub fn all_instruments(&self) -> Vec<&EffectDescriptor> {
        self.instruments.iter().map(|f| f.descriptor()).collect()
    }

    /// Effects in `category`.
    pub fn effects_in_category(&self, category: EffectCategory) -> Vec<&EffectDescriptor> {
        self.effects
            .iter()
            .map(|f| f.descriptor())
            .filter(|d| d.category == category)
            .collect()
    }

    /// Effect descriptor by id.
    pub fn get(&self, id: &str) -> Option<&EffectDescriptor> {
        self.find_effect(id).map(|f| f.descriptor())
    }

    /// Whether an effect with this id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.find_effect(id).is_some()
    }

    /// Whether an instrument with this id is registered.
    pub fn contains_instrument(&self, id: &str) -> bool {
        self.instruments.iter().any(|f| f.descriptor().id == id)
    }

    /// Build an effect instance.
    pub fn create(&self, id: &str, sample_rate: f32) -> Result<Box<dyn EffectWithParams + Send>, LoadError> {
        self.find_effect(id)
            .ok_or_else(|| LoadError::UnknownEffect(id.to_owned()))?
            .create(sample_rate)
    }

    /// Build an instrument instance.
    pub fn create_instrument(&self, id: &str, sample_rate: f32) -> Result<Box<dyn Instrument + Send>, LoadError> {
        self.instruments
            .iter()
            .find(|f| f.descriptor().id == id)
            .ok_or_else(|| LoadError::UnknownInstrument(id.to_owned()))?
            .create(sample_rate)
    }

    /// Parameter descriptors of an effect kind.
    ///
    /// Builds a temporary instance; not for the audio thread.
    pub fn param_descriptors(&self, id: &str) -> Result<Vec<ParamDescriptor>, LoadError> {
        let effect = self.create(id, 48000.0)?;
        Ok((0..effect.effect_param_count())
            .filter_map(|i| effect.effect_param_info(i))
            .collect())
    }

    /// Parameter index by name, short name or string id (case-insensitive).
    pub fn param_index_by_name(&self, id: &str, param: &str) -> Option<usize> {
        self.param_descriptors(id).ok()?.iter().position(|d| {
            d.name.eq_ignore_ascii_case(param)
                || d.short_name.eq_ignore_ascii_case(param)
                || d.string_id.eq_ignore_ascii_case(param)
        })
    }

    /// Number of registered effects.
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Whether no effects are registered.
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    fn find_effect(&self, id: &str) -> Option<&dyn EffectFactory> {
        self.effects
            .iter()
            .find(|f| f.descriptor().id == id)
            .map(|f| f.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixbus_core::Effect;

    struct Broken(EffectDescriptor);

    impl EffectFactory for Broken {
        fn descriptor(&self) -> &EffectDescriptor {
            &self.0
        }

        fn create(&self, _sample_rate: f32) -> Result<Box<dyn EffectWithParams + Send>, LoadError> {
            Err(LoadError::failed(self.0.id, "missing library"))
        }
    }

    fn broken() -> Box<dyn EffectFactory> {
        Box::new(Broken(EffectDescriptor {
            id: "vst-reverb",
            name: "External Reverb",
            description: "Plugin that fails to load",
            category: EffectCategory::TimeBased,
            param_count: 0,
        }))
    }

    #[test]
    fn test_builtins_registered() {
        let registry = EffectRegistry::new();
        let ids: Vec<&str> = registry.all_effects().iter().map(|d| d.id).collect();
        assert_eq!(ids, ["amp", "delay", "filter", "distortion"]);
        assert_eq!(registry.all_instruments()[0].id, "tone");
    }

    #[test]
    fn test_all_effects_can_be_created() {
        let registry = EffectRegistry::new();
        for descriptor in registry.all_effects() {
            let mut effect = registry.create(descriptor.id, 48000.0).unwrap();
            assert_eq!(effect.effect_param_count(), descriptor.param_count, "{}", descriptor.id);
            let (l, r) = effect.process_stereo(0.5, -0.5);
            assert!(l.is_finite() && r.is_finite(), "{}", descriptor.id);
        }
    }

    #[test]
    fn test_string_ids_unique_and_present() {
        let registry = EffectRegistry::new();
        for descriptor in registry.all_effects() {
            let params = registry.param_descriptors(descriptor.id).unwrap();
            for (i, p) in params.iter().enumerate() {
                assert!(!p.string_id.is_empty(), "{} param {i}", descriptor.id);
                assert!(
                    params[i + 1..].iter().all(|q| q.string_id != p.string_id),
                    "{} duplicate {}",
                    descriptor.id,
                    p.string_id
                );
            }
        }
    }

    #[test]
    fn test_unknown_ids() {
        let registry = EffectRegistry::new();
        assert_eq!(
            registry.create("nope", 48000.0).err(),
            Some(LoadError::UnknownEffect("nope".to_string()))
        );
        assert!(matches!(
            registry.create_instrument("nope", 48000.0),
            Err(LoadError::UnknownInstrument(_))
        ));
    }

    #[test]
    fn test_runtime_registration_and_failure() {
        let mut registry = EffectRegistry::new();
        registry.register_effect(broken());
        assert!(registry.contains("vst-reverb"));
        assert_eq!(registry.len(), 5);
        let err = registry.create("vst-reverb", 48000.0).err().unwrap();
        assert_eq!(err.to_string(), "failed to load 'vst-reverb': missing library");

        // same id replaces
        registry.register_effect(broken());
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_param_lookup() {
        let registry = EffectRegistry::new();
        assert_eq!(registry.param_index_by_name("delay", "feedback"), Some(1));
        assert_eq!(registry.param_index_by_name("filter", "CUTOFF"), Some(0));
        assert_eq!(registry.param_index_by_name("filter", "nope"), None);
    }

    #[test]
    fn test_category_filter() {
        let registry = EffectRegistry::new();
        assert_eq!(registry.effects_in_category(EffectCategory::Utility).len(), 1);
        assert_eq!(EffectCategory::TimeBased.name(), "Time-Based");
    }
}
