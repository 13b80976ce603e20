//! Waveshaping distortion.

use mixbus_core::{
    Effect, ParamDescriptor, ParamId, ParameterInfo, SmoothedParam, db_to_linear, hard_clip,
    linear_to_db, soft_clip,
};

/// Waveshaping curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveShape {
    /// `tanh` saturation.
    #[default]
    Soft,
    /// Clip at ±1.
    Hard,
}

/// Drive into a waveshaper, then output level.
///
/// ## Parameter Indices (`ParameterInfo`)
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Drive | 0–40 dB | 12.0 |
/// | 1 | Shape | 0–1 (soft, hard) | 0 |
/// | 2 | Output | -24–12 dB | -6.0 |
#[derive(Debug, Clone)]
pub struct Distortion {
    drive: SmoothedParam,
    output: SmoothedParam,
    shape: WaveShape,
}

impl Distortion {
    /// 12 dB drive, soft shape, -6 dB output.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            drive: SmoothedParam::fast(db_to_linear(12.0), sample_rate),
            output: SmoothedParam::fast(db_to_linear(-6.0), sample_rate),
            shape: WaveShape::Soft,
        }
    }

    /// Set drive in dB.
    pub fn set_drive_db(&mut self, db: f32) {
        self.drive.set_target(db_to_linear(db.clamp(0.0, 40.0)));
    }

    /// Set output level in dB.
    pub fn set_output_db(&mut self, db: f32) {
        self.output.set_target(db_to_linear(db.clamp(-24.0, 12.0)));
    }

    /// Set the waveshaping curve.
    pub fn set_shape(&mut self, shape: WaveShape) {
        self.shape = shape;
    }

    #[inline]
    fn waveshape(&self, x: f32) -> f32 {
        match self.shape {
            WaveShape::Soft => soft_clip(x),
            WaveShape::Hard => hard_clip(x, 1.0),
        }
    }
}

impl Effect for Distortion {
    #[inline]
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let drive = self.drive.advance();
        let output = self.output.advance();
        (
            self.waveshape(left * drive) * output,
            self.waveshape(right * drive) * output,
        )
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.drive.set_sample_rate(sample_rate);
        self.output.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.drive.snap_to_target();
        self.output.snap_to_target();
    }
}

impl ParameterInfo for Distortion {
    fn param_count(&self) -> usize {
        3
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(
                ParamDescriptor::gain_db("Drive", "Drive", 0.0, 40.0, 12.0)
                    .with_id(ParamId(400), "drive"),
            ),
            1 => Some(ParamDescriptor::stepped("Shape", "Shape", 1.0, 0.0).with_id(ParamId(401), "shape")),
            2 => Some(
                ParamDescriptor::gain_db("Output", "Output", -24.0, 12.0, -6.0)
                    .with_id(ParamId(402), "output"),
            ),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => linear_to_db(self.drive.target()),
            1 => match self.shape {
                WaveShape::Soft => 0.0,
                WaveShape::Hard => 1.0,
            },
            2 => linear_to_db(self.output.target()),
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.set_drive_db(value),
            1 => self.set_shape(if value >= 0.5 { WaveShape::Hard } else { WaveShape::Soft }),
            2 => self.set_output_db(value),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_bounded() {
        let mut d = Distortion::new(48000.0);
        d.set_drive_db(40.0);
        d.set_output_db(0.0);
        d.reset();
        for shape in [WaveShape::Soft, WaveShape::Hard] {
            d.set_shape(shape);
            let (l, r) = d.process_stereo(10.0, -10.0);
            assert!(l <= 1.0 && r >= -1.0, "{shape:?}");
        }
    }

    #[test]
    fn test_shape_param() {
        let mut d = Distortion::new(48000.0);
        d.set_param(1, 1.0);
        assert_eq!(d.get_param(1), 1.0);
        assert!((d.get_param(2) + 6.0).abs() < 0.01);
    }
}
