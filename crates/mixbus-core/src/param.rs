//! Parameter smoothing for click-free gain, pan and effect changes.
//!
//! New values arrive at buffer boundaries; [`SmoothedParam`] spreads the jump
//! across the following samples with a one-pole lowpass so volume and pan
//! moves do not produce zipper noise.
//!
//! ```rust
//! use mixbus_core::SmoothedParam;
//!
//! let mut gain = SmoothedParam::with_config(1.0, 48000.0, 10.0);
//! gain.set_target(0.5);
//! for _ in 0..4800 {
//!     gain.advance();
//! }
//! assert!((gain.get() - 0.5).abs() < 1e-3);
//! ```

use libm::expf;

/// A value that moves exponentially toward its target, one sample at a time.
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    coeff: f32,
    sample_rate: f32,
    smoothing_time_ms: f32,
}

impl SmoothedParam {
    /// Unsmoothed parameter: changes apply instantly until a smoothing time
    /// is configured.
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: 1.0,
            sample_rate: 48000.0,
            smoothing_time_ms: 0.0,
        }
    }

    /// Fully configured parameter.
    pub fn with_config(initial: f32, sample_rate: f32, smoothing_time_ms: f32) -> Self {
        let mut param = Self::new(initial);
        param.sample_rate = sample_rate;
        param.smoothing_time_ms = smoothing_time_ms;
        param.recalculate_coeff();
        param
    }

    /// 5 ms smoothing. Used for bypass fades and channel faders.
    pub fn fast(initial: f32, sample_rate: f32) -> Self {
        Self::with_config(initial, sample_rate, 5.0)
    }

    /// 10 ms smoothing. Used for effect gains.
    pub fn standard(initial: f32, sample_rate: f32) -> Self {
        Self::with_config(initial, sample_rate, 10.0)
    }

    /// Set a new target.
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Update the sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate_coeff();
    }

    /// Advance one sample and return the new value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.current += self.coeff * (self.target - self.current);
        self.current
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Target value.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Jump to the target.
    #[inline]
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
    }

    // coeff = 1 - exp(-1 / (tau * sample_rate)), tau in seconds
    fn recalculate_coeff(&mut self) {
        if self.smoothing_time_ms <= 0.0 || self.sample_rate <= 0.0 {
            self.coeff = 1.0;
        } else {
            let samples = self.smoothing_time_ms / 1000.0 * self.sample_rate;
            self.coeff = 1.0 - expf(-1.0 / samples);
        }
    }
}

impl Default for SmoothedParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}
