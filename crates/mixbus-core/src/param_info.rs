//! Parameter introspection for effects.
//!
//! [`ParameterInfo`] lets the engine, the project loader and the CLI discover
//! an effect's parameters at runtime without knowing its concrete type. Each
//! parameter is described by a [`ParamDescriptor`] that carries its range,
//! unit, default and two stable identifiers:
//!
//! - [`ParamId`]: numeric id, stable across releases.
//! - `string_id`: the key used in the effect instance's parameter map and in
//!   project files (e.g. `"dly_time"`).
//!
//! # Example
//!
//! ```rust
//! use mixbus_core::{ParameterInfo, ParamDescriptor, ParamId};
//!
//! struct SimpleGain {
//!     gain_db: f32,
//! }
//!
//! impl ParameterInfo for SimpleGain {
//!     fn param_count(&self) -> usize { 1 }
//!
//!     fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
//!         match index {
//!             0 => Some(ParamDescriptor::gain_db("Gain", "Gain", -60.0, 12.0, 0.0)
//!                 .with_id(ParamId(100), "gain_db")),
//!             _ => None,
//!         }
//!     }
//!
//!     fn get_param(&self, index: usize) -> f32 {
//!         if index == 0 { self.gain_db } else { 0.0 }
//!     }
//!
//!     fn set_param(&mut self, index: usize, value: f32) {
//!         if index == 0 {
//!             self.gain_db = value.clamp(-60.0, 12.0);
//!         }
//!     }
//! }
//!
//! let mut g = SimpleGain { gain_db: 0.0 };
//! let idx = g.find_param_by_string_id("gain_db").unwrap();
//! g.set_param(idx, -100.0);
//! assert_eq!(g.get_param(idx), -60.0);
//! ```

#[cfg(not(feature = "std"))]
use alloc::{format, string::String};

/// Stable numeric parameter identifier.
///
/// Each effect gets a base id and numbers its parameters from there
/// (amp 100.., delay 200.., filter 300.., distortion 400..).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ParamId(pub u32);

/// Runtime parameter access for an effect.
///
/// Valid indices are `0..param_count()`. Out-of-range reads return `0.0` and
/// out-of-range writes are ignored. `set_param` clamps to the descriptor range.
pub trait ParameterInfo {
    /// Number of parameters.
    fn param_count(&self) -> usize;

    /// Descriptor for the parameter at `index`, or `None` when out of range.
    fn param_info(&self, index: usize) -> Option<ParamDescriptor>;

    /// Current value of the parameter at `index`.
    fn get_param(&self, index: usize) -> f32;

    /// Set the parameter at `index`, clamped to its range.
    fn set_param(&mut self, index: usize, value: f32);

    /// Find a parameter index by name or short name (case-insensitive).
    fn find_param_by_name(&self, name: &str) -> Option<usize> {
        (0..self.param_count()).find(|&i| {
            self.param_info(i).is_some_and(|d| {
                d.name.eq_ignore_ascii_case(name) || d.short_name.eq_ignore_ascii_case(name)
            })
        })
    }

    /// Find a parameter index by its `string_id`.
    ///
    /// O(n) scan; meant for setup paths, not the audio callback.
    fn find_param_by_string_id(&self, string_id: &str) -> Option<usize> {
        (0..self.param_count()).find(|&i| self.param_info(i).is_some_and(|d| d.string_id == string_id))
    }

    /// Find a parameter index by its stable [`ParamId`].
    fn param_index_by_id(&self, id: ParamId) -> Option<usize> {
        (0..self.param_count()).find(|&i| self.param_info(i).is_some_and(|d| d.id == id))
    }
}

/// Metadata for a single parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDescriptor {
    /// Full display name (e.g. "Delay Time").
    pub name: &'static str,
    /// Short name, at most 8 characters (e.g. "Time").
    pub short_name: &'static str,
    /// Unit used for formatting and parsing.
    pub unit: ParamUnit,
    /// Minimum value.
    pub min: f32,
    /// Maximum value.
    pub max: f32,
    /// Value on creation.
    pub default: f32,
    /// Recommended increment for stepped controls.
    pub step: f32,
    /// Stable numeric id.
    pub id: ParamId,
    /// Stable string id used as the parameter map key.
    pub string_id: &'static str,
}

impl ParamDescriptor {
    /// Mix parameter, 0–100 %, default 50 %.
    pub fn mix() -> Self {
        Self {
            name: "Mix",
            short_name: "Mix",
            unit: ParamUnit::Percent,
            min: 0.0,
            max: 100.0,
            default: 50.0,
            step: 1.0,
            id: ParamId::default(),
            string_id: "",
        }
    }

    /// Percentage parameter with a custom name and default.
    pub fn percent(name: &'static str, short_name: &'static str, default: f32) -> Self {
        Self {
            name,
            short_name,
            default,
            ..Self::mix()
        }
    }

    /// Gain parameter in decibels.
    pub fn gain_db(
        name: &'static str,
        short_name: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self {
            name,
            short_name,
            unit: ParamUnit::Decibels,
            min,
            max,
            default,
            step: 0.5,
            ..Self::mix()
        }
    }

    /// Time parameter in milliseconds.
    pub fn time_ms(
        name: &'static str,
        short_name: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self {
            name,
            short_name,
            unit: ParamUnit::Milliseconds,
            min,
            max,
            default,
            step: 1.0,
            ..Self::mix()
        }
    }

    /// Frequency parameter in hertz.
    pub fn frequency_hz(
        name: &'static str,
        short_name: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self {
            name,
            short_name,
            unit: ParamUnit::Hertz,
            min,
            max,
            default,
            step: 1.0,
            ..Self::mix()
        }
    }

    /// Discrete selector with values `0..=max` (filter mode, clip shape).
    pub fn stepped(name: &'static str, short_name: &'static str, max: f32, default: f32) -> Self {
        Self {
            name,
            short_name,
            unit: ParamUnit::None,
            min: 0.0,
            max,
            default,
            step: 1.0,
            ..Self::mix()
        }
    }

    /// Set the stable ids.
    pub fn with_id(mut self, id: ParamId, string_id: &'static str) -> Self {
        self.id = id;
        self.string_id = string_id;
        self
    }

    /// Clamp a value to `[min, max]`.
    ///
    /// ```rust
    /// use mixbus_core::ParamDescriptor;
    ///
    /// let desc = ParamDescriptor::gain_db("Gain", "Gain", -60.0, 12.0, 0.0);
    /// assert_eq!(desc.clamp(-100.0), -60.0);
    /// assert_eq!(desc.clamp(100.0), 12.0);
    /// ```
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    /// Format a value with its unit suffix.
    ///
    /// ```rust
    /// use mixbus_core::ParamDescriptor;
    ///
    /// let desc = ParamDescriptor::gain_db("Gain", "Gain", -60.0, 12.0, 0.0);
    /// assert_eq!(desc.format_value(-6.0), "-6.0 dB");
    /// ```
    pub fn format_value(&self, value: f32) -> String {
        match self.unit {
            ParamUnit::Decibels => format!("{value:.1}{}", self.unit.suffix()),
            ParamUnit::Hertz | ParamUnit::Milliseconds | ParamUnit::Percent => {
                format!("{value:.0}{}", self.unit.suffix())
            }
            ParamUnit::Ratio => format!("{value:.2}{}", self.unit.suffix()),
            ParamUnit::None => format!("{value:.0}"),
        }
    }

    /// Parse display text back into a clamped value.
    ///
    /// Accepts the bare number or the number followed by this parameter's
    /// unit suffix (`"250 ms"`, `"250ms"`, `"-3 dB"`).
    pub fn parse_value(&self, text: &str) -> Option<f32> {
        let trimmed = text.trim();
        let suffix = self.unit.suffix().trim();
        let number = if suffix.is_empty() {
            trimmed
        } else {
            trimmed.strip_suffix(suffix).unwrap_or(trimmed).trim()
        };
        number.parse::<f32>().ok().map(|v| self.clamp(v))
    }
}

/// Unit type for parameter display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamUnit {
    /// Decibels.
    Decibels,
    /// Hertz.
    Hertz,
    /// Milliseconds.
    Milliseconds,
    /// Percent (0–100).
    Percent,
    /// Dimensionless ratio.
    Ratio,
    /// No unit.
    None,
}

impl ParamUnit {
    /// Display suffix.
    ///
    /// ```rust
    /// use mixbus_core::ParamUnit;
    ///
    /// assert_eq!(ParamUnit::Decibels.suffix(), " dB");
    /// assert_eq!(ParamUnit::None.suffix(), "");
    /// ```
    pub const fn suffix(&self) -> &'static str {
        match self {
            ParamUnit::Decibels => " dB",
            ParamUnit::Hertz => " Hz",
            ParamUnit::Milliseconds => " ms",
            ParamUnit::Percent => "%",
            ParamUnit::Ratio => "x",
            ParamUnit::None => "",
        }
    }
}
