//! Core Effect trait.
//!
//! The [`Effect`] trait is the DSP capability every effect slot in a mixer
//! channel is built on. Effects work on stereo frames because mixer channels
//! are stereo end to end; a mono convenience path is provided on top.
//!
//! ## Design Decisions
//!
//! - **Stereo first**: [`Effect::process_stereo`] is the one required DSP
//!   method. Effects with independent per-side state keep one state per side.
//!
//! - **Object-safe**: channels hold `Box<dyn EffectWithParams + Send>`, so the
//!   trait has no generic methods.
//!
//! - **No allocations**: every method may be called from the audio callback.

/// Core trait for all audio effects.
///
/// # Example
///
/// ```rust
/// use mixbus_core::Effect;
///
/// struct Gain {
///     gain: f32,
/// }
///
/// impl Effect for Gain {
///     fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
///         (left * self.gain, right * self.gain)
///     }
///
///     fn set_sample_rate(&mut self, _sample_rate: f32) {}
///
///     fn reset(&mut self) {}
/// }
///
/// let mut g = Gain { gain: 0.5 };
/// assert_eq!(g.process_stereo(1.0, -1.0), (0.5, -0.5));
/// ```
pub trait Effect {
    /// Process one stereo frame.
    fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32);

    /// Process a single mono sample.
    ///
    /// Default feeds the sample to both sides and averages the result.
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let (l, r) = self.process_stereo(input, input);
        (l + r) * 0.5
    }

    /// Process a stereo block in place.
    ///
    /// Default calls [`process_stereo`](Self::process_stereo) per frame.
    /// Both slices must have the same length; extra samples on the longer
    /// side are left untouched.
    fn process_block_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len());
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (ol, or) = self.process_stereo(*l, *r);
            *l = ol;
            *r = or;
        }
    }

    /// Update the sample rate and recompute rate-dependent state.
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Clear internal state (delay lines, filter history) without touching
    /// parameters.
    fn reset(&mut self);

    /// Processing latency in samples. Default is 0.
    fn latency_samples(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gain(f32);

    impl Effect for Gain {
        fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
            (left * self.0, right * self.0)
        }
        fn set_sample_rate(&mut self, _: f32) {}
        fn reset(&mut self) {}
    }

    struct Swap;

    impl Effect for Swap {
        fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
            (right, left)
        }
        fn set_sample_rate(&mut self, _: f32) {}
        fn reset(&mut self) {}
    }

    #[test]
    fn test_mono_path_averages_sides() {
        let mut g = Gain(2.0);
        assert_eq!(g.process(0.25), 0.5);
    }

    #[test]
    fn test_block_stereo() {
        let mut s = Swap;
        let mut left = [1.0, 2.0];
        let mut right = [3.0, 4.0];
        s.process_block_stereo(&mut left, &mut right);
        assert_eq!(left, [3.0, 4.0]);
        assert_eq!(right, [1.0, 2.0]);
    }

    #[test]
    fn test_default_latency() {
        assert_eq!(Gain(1.0).latency_samples(), 0);
    }
}
