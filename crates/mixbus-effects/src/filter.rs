//! Resonant biquad filter with lowpass, highpass and bandpass modes.
//!
//! Coefficients follow the RBJ Audio EQ Cookbook.

use core::f32::consts::PI;

use libm::{cosf, sinf};
use mixbus_core::{
    Effect, ParamDescriptor, ParamId, ParamUnit, ParameterInfo, flush_denormal,
};

/// Filter response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Passes below the cutoff.
    #[default]
    Lowpass,
    /// Passes above the cutoff.
    Highpass,
    /// Passes around the cutoff, 0 dB peak.
    Bandpass,
}

impl FilterMode {
    fn from_index(index: f32) -> Self {
        match index as u32 {
            1 => Self::Highpass,
            2 => Self::Bandpass,
            _ => Self::Lowpass,
        }
    }

    fn index(self) -> f32 {
        match self {
            Self::Lowpass => 0.0,
            Self::Highpass => 1.0,
            Self::Bandpass => 2.0,
        }
    }
}

/// Normalized biquad coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    fn design(mode: FilterMode, frequency: f32, q: f32, sample_rate: f32) -> Self {
        let frequency = frequency.clamp(10.0, sample_rate * 0.49);
        let omega = 2.0 * PI * frequency / sample_rate;
        let (sin_w, cos_w) = (sinf(omega), cosf(omega));
        let alpha = sin_w / (2.0 * q.max(0.05));

        let (b0, b1, b2) = match mode {
            FilterMode::Lowpass => ((1.0 - cos_w) / 2.0, 1.0 - cos_w, (1.0 - cos_w) / 2.0),
            FilterMode::Highpass => ((1.0 + cos_w) / 2.0, -(1.0 + cos_w), (1.0 + cos_w) / 2.0),
            FilterMode::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos_w / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Direct Form I history for one side.
#[derive(Debug, Clone, Copy, Default)]
struct History {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl History {
    #[inline]
    fn process(&mut self, c: &Coefficients, x: f32) -> f32 {
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = flush_denormal(y);
        self.y1
    }
}

/// Stereo resonant filter.
///
/// ## Parameter Indices (`ParameterInfo`)
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Cutoff | 20–20000 Hz | 1000.0 |
/// | 1 | Resonance | 0.1–10.0 | 0.707 |
/// | 2 | Mode | 0–2 (LP, HP, BP) | 0 |
#[derive(Debug, Clone)]
pub struct Filter {
    coefficients: Coefficients,
    left: History,
    right: History,
    cutoff: f32,
    resonance: f32,
    mode: FilterMode,
    sample_rate: f32,
}

impl Filter {
    /// Lowpass at 1 kHz, Butterworth Q.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            coefficients: Coefficients::design(FilterMode::Lowpass, 1000.0, 0.707, sample_rate),
            left: History::default(),
            right: History::default(),
            cutoff: 1000.0,
            resonance: 0.707,
            mode: FilterMode::Lowpass,
            sample_rate,
        }
    }

    /// Set the cutoff in Hz.
    pub fn set_cutoff_hz(&mut self, hz: f32) {
        self.cutoff = hz.clamp(20.0, 20000.0);
        self.update();
    }

    /// Set the resonance (Q).
    pub fn set_resonance(&mut self, q: f32) {
        self.resonance = q.clamp(0.1, 10.0);
        self.update();
    }

    /// Set the response.
    pub fn set_mode(&mut self, mode: FilterMode) {
        self.mode = mode;
        self.update();
    }

    /// Current response.
    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    fn update(&mut self) {
        self.coefficients =
            Coefficients::design(self.mode, self.cutoff, self.resonance, self.sample_rate);
    }
}

impl Effect for Filter {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        (
            self.left.process(&self.coefficients, left),
            self.right.process(&self.coefficients, right),
        )
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update();
    }

    fn reset(&mut self) {
        self.left = History::default();
        self.right = History::default();
    }
}

impl ParameterInfo for Filter {
    fn param_count(&self) -> usize {
        3
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(
                ParamDescriptor::frequency_hz("Cutoff", "Cutoff", 20.0, 20000.0, 1000.0)
                    .with_id(ParamId(300), "cutoff"),
            ),
            1 => Some(
                ParamDescriptor {
                    name: "Resonance",
                    short_name: "Reso",
                    unit: ParamUnit::Ratio,
                    min: 0.1,
                    max: 10.0,
                    default: 0.707,
                    step: 0.01,
                    ..ParamDescriptor::mix()
                }
                .with_id(ParamId(301), "resonance"),
            ),
            2 => Some(ParamDescriptor::stepped("Mode", "Mode", 2.0, 0.0).with_id(ParamId(302), "mode")),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.cutoff,
            1 => self.resonance,
            2 => self.mode.index(),
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_cutoff_hz(value),
            1 => self.set_resonance(value),
            2 => self.set_mode(FilterMode::from_index(value.clamp(0.0, 2.0))),
            _ => {}
        }
    }
}
