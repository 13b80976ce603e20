//! Feedback delay.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use libm::{ceilf, floorf};
use mixbus_core::{
    Effect, ParamDescriptor, ParamId, ParameterInfo, SmoothedParam, flush_denormal,
};

/// Longest supported delay.
pub const MAX_DELAY_MS: f32 = 2000.0;

/// Ring buffer read with linear interpolation.
#[derive(Debug, Clone)]
struct DelayLine {
    buffer: Vec<f32>,
    write: usize,
}

impl DelayLine {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(2)],
            write: 0,
        }
    }

    #[inline]
    fn read(&self, delay: f32) -> f32 {
        let len = self.buffer.len();
        let whole = floorf(delay) as usize;
        let frac = delay - whole as f32;
        let a = self.buffer[(self.write + len - whole % len) % len];
        let b = self.buffer[(self.write + len - (whole + 1) % len) % len];
        a + (b - a) * frac
    }

    #[inline]
    fn write(&mut self, sample: f32) {
        self.buffer[self.write] = sample;
        self.write = (self.write + 1) % self.buffer.len();
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
    }
}

/// Stereo feedback delay with its own mix control.
///
/// The slot wet/dry applies on top of the internal mix.
///
/// ## Parameter Indices (`ParameterInfo`)
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Delay Time | 1–2000 ms | 300.0 |
/// | 1 | Feedback | 0–95% | 40.0 |
/// | 2 | Mix | 0–100% | 50.0 |
///
/// # Example
///
/// ```rust
/// use mixbus_core::Effect;
/// use mixbus_effects::Delay;
///
/// let mut delay = Delay::new(48000.0);
/// delay.set_delay_time_ms(250.0);
/// delay.set_feedback(0.5);
/// let (l, r) = delay.process_stereo(0.5, 0.5);
/// assert!(l.is_finite() && r.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct Delay {
    left: DelayLine,
    right: DelayLine,
    delay_samples: SmoothedParam,
    feedback: SmoothedParam,
    mix: SmoothedParam,
    sample_rate: f32,
    max_delay_samples: f32,
}

impl Delay {
    /// Delay with a two second buffer, 300 ms time.
    pub fn new(sample_rate: f32) -> Self {
        let max = ceilf(MAX_DELAY_MS / 1000.0 * sample_rate) as usize + 2;
        Self {
            left: DelayLine::new(max),
            right: DelayLine::new(max),
            delay_samples: SmoothedParam::with_config(0.3 * sample_rate, sample_rate, 50.0),
            feedback: SmoothedParam::standard(0.4, sample_rate),
            mix: SmoothedParam::standard(0.5, sample_rate),
            sample_rate,
            max_delay_samples: max as f32 - 2.0,
        }
    }

    /// Set delay time in milliseconds.
    pub fn set_delay_time_ms(&mut self, ms: f32) {
        let samples = ms.clamp(1.0, MAX_DELAY_MS) / 1000.0 * self.sample_rate;
        self.delay_samples
            .set_target(samples.clamp(1.0, self.max_delay_samples));
    }

    /// Set feedback in `[0, 0.95]`.
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback.set_target(feedback.clamp(0.0, 0.95));
    }

    /// Set the internal mix in `[0, 1]`.
    pub fn set_mix(&mut self, mix: f32) {
        self.mix.set_target(mix.clamp(0.0, 1.0));
    }

    /// Delay time in milliseconds.
    pub fn delay_time_ms(&self) -> f32 {
        self.delay_samples.target() / self.sample_rate * 1000.0
    }
}

impl Effect for Delay {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let delay = self.delay_samples.advance();
        let feedback = self.feedback.advance();
        let mix = self.mix.advance();

        let dl = self.left.read(delay);
        let dr = self.right.read(delay);
        self.left.write(flush_denormal(left + dl * feedback));
        self.right.write(flush_denormal(right + dr * feedback));

        (
            left * (1.0 - mix) + dl * mix,
            right * (1.0 - mix) + dr * mix,
        )
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        let ms = self.delay_time_ms();
        *self = Self {
            feedback: self.feedback.clone(),
            mix: self.mix.clone(),
            ..Self::new(sample_rate)
        };
        self.feedback.set_sample_rate(sample_rate);
        self.mix.set_sample_rate(sample_rate);
        self.set_delay_time_ms(ms);
        self.delay_samples.snap_to_target();
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
        self.delay_samples.snap_to_target();
        self.feedback.snap_to_target();
        self.mix.snap_to_target();
    }
}

impl ParameterInfo for Delay {
    fn param_count(&self) -> usize {
        3
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(
                ParamDescriptor::time_ms("Delay Time", "Time", 1.0, MAX_DELAY_MS, 300.0)
                    .with_id(ParamId(200), "time"),
            ),
            1 => Some(
                ParamDescriptor {
                    max: 95.0,
                    ..ParamDescriptor::percent("Feedback", "Feedback", 40.0)
                }
                .with_id(ParamId(201), "feedback"),
            ),
            2 => Some(ParamDescriptor::mix().with_id(ParamId(202), "mix")),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.delay_time_ms(),
            1 => self.feedback.target() * 100.0,
            2 => self.mix.target() * 100.0,
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_delay_time_ms(value),
            1 => self.set_feedback(value / 100.0),
            2 => self.set_mix(value / 100.0),
            _ => {}
        }
    }
}
