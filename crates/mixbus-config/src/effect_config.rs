//! Effect slot configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use mixbus_core::{DEFAULT_DECAY_MS, DEFAULT_GATE_DB, EffectSettings};

use crate::error::ConfigError;

fn default_true() -> bool {
    true
}

fn default_wet_dry() -> f32 {
    1.0
}

fn default_gate_db() -> f32 {
    DEFAULT_GATE_DB
}

fn default_decay_ms() -> f32 {
    DEFAULT_DECAY_MS
}

/// One effect in a channel's chain.
///
/// Parameter values are strings in the parameter's own unit, optionally
/// suffixed (`"40%"`, `"-6dB"`, `"250ms"`, `"1.2kHz"`). Prefixing the type
/// with `!` creates a disabled slot.
///
/// ```rust
/// use mixbus_config::EffectConfig;
///
/// let config = EffectConfig::new("!delay").with_param("time", "250ms");
/// assert_eq!(config.effect_type, "delay");
/// assert!(!config.enabled);
/// assert_eq!(config.parse_param("time"), Some(250.0));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EffectConfig {
    /// Registry id of the effect.
    #[serde(rename = "type")]
    pub effect_type: String,

    /// Whether the slot processes audio.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Wet/dry ratio in `[0, 1]`.
    #[serde(default = "default_wet_dry")]
    pub wet_dry: f32,

    /// Auto-shutoff gate in dB.
    #[serde(default = "default_gate_db")]
    pub gate_db: f32,

    /// Quiet time before the slot sleeps, in milliseconds.
    #[serde(default = "default_decay_ms")]
    pub decay_ms: f32,

    /// Whether the slot may sleep on silence.
    #[serde(default = "default_true")]
    pub auto_shutoff: bool,

    /// Parameter values keyed by `string_id`.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl EffectConfig {
    /// Enabled slot with defaults. A leading `!` disables it.
    pub fn new(effect_type: impl Into<String>) -> Self {
        let type_str = effect_type.into();
        let (effect_type, enabled) = match type_str.strip_prefix('!') {
            Some(stripped) => (stripped.to_string(), false),
            None => (type_str, true),
        };
        Self {
            effect_type,
            enabled,
            wet_dry: 1.0,
            gate_db: DEFAULT_GATE_DB,
            decay_ms: DEFAULT_DECAY_MS,
            auto_shutoff: true,
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set the wet/dry ratio.
    pub fn with_wet_dry(mut self, wet_dry: f32) -> Self {
        self.wet_dry = wet_dry;
        self
    }

    /// Parse a parameter value.
    pub fn parse_param(&self, key: &str) -> Option<f32> {
        parse_param_value(self.params.get(key)?)
    }

    /// Type with a `!` prefix when disabled.
    pub fn display_type(&self) -> String {
        if self.enabled {
            self.effect_type.clone()
        } else {
            format!("!{}", self.effect_type)
        }
    }

    /// Model settings for this slot.
    pub fn to_settings(&self) -> Result<EffectSettings, ConfigError> {
        let mut settings = EffectSettings::new(self.effect_type.clone())
            .with_wet_dry(self.wet_dry)
            .with_shutoff(self.gate_db, self.decay_ms);
        settings.enabled = self.enabled;
        settings.auto_shutoff = self.auto_shutoff;
        for (key, text) in &self.params {
            let value = parse_param_value(text).ok_or_else(|| ConfigError::InvalidParameter {
                effect: self.effect_type.clone(),
                param: key.clone(),
                reason: format!("cannot parse '{}' as a number", text),
            })?;
            settings.params.insert(key.clone(), value);
        }
        Ok(settings)
    }

    /// Config for model settings. Values keep full precision.
    pub fn from_settings(settings: &EffectSettings) -> Self {
        Self {
            effect_type: settings.kind.clone(),
            enabled: settings.enabled,
            wet_dry: settings.wet_dry,
            gate_db: settings.gate_db,
            decay_ms: settings.decay_ms,
            auto_shutoff: settings.auto_shutoff,
            params: settings
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
        }
    }
}

/// Parse a parameter value in its display unit.
///
/// - Plain numbers: `"0.5"`, `"-6"`
/// - Percent and decibels keep the number: `"40%"` is 40, `"-6dB"` is -6
/// - Time normalizes to milliseconds: `"250ms"` is 250, `"1.5s"` is 1500
/// - Frequency normalizes to hertz: `"440Hz"` is 440, `"1.2kHz"` is 1200
pub fn parse_param_value(value: &str) -> Option<f32> {
    let value = value.trim();
    let number = |s: &str| s.trim().parse::<f32>().ok().filter(|v| v.is_finite());

    if let Some(pct) = value.strip_suffix('%') {
        return number(pct);
    }
    if let Some(db) = value
        .strip_suffix("dB")
        .or_else(|| value.strip_suffix("db"))
    {
        return number(db);
    }
    if let Some(ms) = value.strip_suffix("ms") {
        return number(ms);
    }
    if let Some(s) = value.strip_suffix('s') {
        return number(s).map(|v| v * 1000.0);
    }
    if let Some(khz) = value
        .strip_suffix("kHz")
        .or_else(|| value.strip_suffix("khz"))
    {
        return number(khz).map(|v| v * 1000.0);
    }
    if let Some(hz) = value
        .strip_suffix("Hz")
        .or_else(|| value.strip_suffix("hz"))
    {
        return number(hz);
    }
    number(value)
}
