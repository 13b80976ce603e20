//! Stereo audio buffer shared by tracks, channel strips and effect slots.

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::math::peak;

/// A stereo buffer with separate left and right sample vectors.
///
/// `Default` gives an empty buffer without allocating, which lets the
/// renderer temporarily take a strip's buffer out with `core::mem::take`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StereoBuffer {
    /// Left channel samples.
    pub left: Vec<f32>,
    /// Right channel samples.
    pub right: Vec<f32>,
}

impl StereoBuffer {
    /// Zeroed buffer of `len` frames.
    pub fn new(len: usize) -> Self {
        Self {
            left: vec![0.0; len],
            right: vec![0.0; len],
        }
    }

    /// Buffer from existing sample vectors. The shorter side sets the length.
    pub fn from_channels(mut left: Vec<f32>, mut right: Vec<f32>) -> Self {
        let len = left.len().min(right.len());
        left.truncate(len);
        right.truncate(len);
        Self { left, right }
    }

    /// Zero both sides.
    pub fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
    }

    /// Resize both sides, zeroing new frames.
    ///
    /// Never reallocates when `len` is within the current capacity.
    pub fn resize(&mut self, len: usize) {
        self.left.resize(len, 0.0);
        self.right.resize(len, 0.0);
    }

    /// Frames per side.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Whether the buffer holds no frames.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Copy another buffer of the same length.
    pub fn copy_from(&mut self, other: &StereoBuffer) {
        self.left.copy_from_slice(&other.left);
        self.right.copy_from_slice(&other.right);
    }

    /// Add another buffer into this one.
    pub fn accumulate_from(&mut self, other: &StereoBuffer) {
        self.accumulate_scaled(other, 1.0);
    }

    /// Add another buffer scaled by `gain`. Used for sends.
    pub fn accumulate_scaled(&mut self, other: &StereoBuffer, gain: f32) {
        for (dst, src) in self.left.iter_mut().zip(other.left.iter()) {
            *dst += *src * gain;
        }
        for (dst, src) in self.right.iter_mut().zip(other.right.iter()) {
            *dst += *src * gain;
        }
    }

    /// Multiply both sides by `gain`.
    pub fn scale(&mut self, gain: f32) {
        for s in self.left.iter_mut().chain(self.right.iter_mut()) {
            *s *= gain;
        }
    }

    /// Largest absolute sample on either side.
    pub fn peak(&self) -> f32 {
        peak(&self.left).max(peak(&self.right))
    }

    /// Whether every sample on both sides is exactly zero.
    pub fn is_silent(&self) -> bool {
        self.left.iter().chain(self.right.iter()).all(|s| *s == 0.0)
    }
}
