//! Level, pan and mixing helpers.
//!
//! All functions are allocation-free and `no_std`.

use libm::{expf, logf, tanhf};

/// Convert decibels to linear gain.
///
/// ```rust
/// use mixbus_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-40.0) - 0.01).abs() < 1e-5);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels. Floors at -200 dB.
///
/// ```rust
/// use mixbus_core::linear_to_db;
///
/// assert!(linear_to_db(1.0).abs() < 0.001);
/// assert!((linear_to_db(0.5) + 6.02).abs() < 0.01);
/// ```
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// Smooth saturation toward ±1.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    tanhf(x)
}

/// Hard clip to `±threshold`.
#[inline]
pub fn hard_clip(x: f32, threshold: f32) -> f32 {
    x.clamp(-threshold, threshold)
}

/// Blend dry and wet: `dry * (1 - mix) + wet * mix`.
#[inline]
pub fn wet_dry_mix(dry: f32, wet: f32, mix: f32) -> f32 {
    dry * (1.0 - mix) + wet * mix
}

/// Balance-style pan gains for `pan` in `[-1, 1]`.
///
/// Center is unity on both sides; panning right attenuates the left side
/// linearly and vice versa.
///
/// ```rust
/// use mixbus_core::pan_gains;
///
/// assert_eq!(pan_gains(0.0), (1.0, 1.0));
/// assert_eq!(pan_gains(1.0), (0.0, 1.0));
/// assert_eq!(pan_gains(-0.5), (1.0, 0.5));
/// ```
#[inline]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    ((1.0 - pan).min(1.0), (1.0 + pan).min(1.0))
}

/// Largest absolute sample value.
#[inline]
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Flush denormals to zero.
#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}
