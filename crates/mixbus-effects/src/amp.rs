//! Gain and pan stage.

use mixbus_core::{
    Effect, ParamDescriptor, ParamId, ParameterInfo, SmoothedParam, db_to_linear, linear_to_db,
    pan_gains,
};

/// Gain and balance stage.
///
/// ## Parameter Indices (`ParameterInfo`)
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Gain | -60–24 dB | 0.0 |
/// | 1 | Pan | -100–100% | 0.0 |
///
/// # Example
///
/// ```rust
/// use mixbus_core::Effect;
/// use mixbus_effects::Amp;
///
/// let mut amp = Amp::new(48000.0);
/// amp.set_gain_db(-6.0);
/// amp.reset();
/// let (l, r) = amp.process_stereo(1.0, 1.0);
/// assert!((l - 0.501).abs() < 0.01 && (r - 0.501).abs() < 0.01);
/// ```
#[derive(Debug, Clone)]
pub struct Amp {
    gain: SmoothedParam,
    pan: SmoothedParam,
}

impl Amp {
    /// Unity gain, centered.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            gain: SmoothedParam::standard(1.0, sample_rate),
            pan: SmoothedParam::standard(0.0, sample_rate),
        }
    }

    /// Set gain in dB.
    pub fn set_gain_db(&mut self, db: f32) {
        self.gain.set_target(db_to_linear(db.clamp(-60.0, 24.0)));
    }

    /// Set pan in `[-1, 1]`.
    pub fn set_pan(&mut self, pan: f32) {
        self.pan.set_target(pan.clamp(-1.0, 1.0));
    }

    /// Gain in dB.
    pub fn gain_db(&self) -> f32 {
        linear_to_db(self.gain.target())
    }
}

impl Effect for Amp {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let gain = self.gain.advance();
        let (pl, pr) = pan_gains(self.pan.advance());
        (left * gain * pl, right * gain * pr)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.gain.set_sample_rate(sample_rate);
        self.pan.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.gain.snap_to_target();
        self.pan.snap_to_target();
    }
}

impl ParameterInfo for Amp {
    fn param_count(&self) -> usize {
        2
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(
                ParamDescriptor::gain_db("Gain", "Gain", -60.0, 24.0, 0.0)
                    .with_id(ParamId(100), "gain"),
            ),
            1 => Some(
                ParamDescriptor {
                    min: -100.0,
                    ..ParamDescriptor::percent("Pan", "Pan", 0.0)
                }
                .with_id(ParamId(101), "pan"),
            ),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.gain_db(),
            1 => self.pan.target() * 100.0,
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_gain_db(value),
            1 => self.set_pan(value / 100.0),
            _ => {}
        }
    }
}
