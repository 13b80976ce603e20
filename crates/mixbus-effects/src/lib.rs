//! mixbus Effects - built-in channel effects and instrument
//!
//! Effects implement [`mixbus_core::Effect`] and [`mixbus_core::ParameterInfo`],
//! so they can sit in any channel's effect chain as
//! `Box<dyn EffectWithParams + Send>`:
//!
//! - [`Amp`] - Gain and pan
//! - [`Delay`] - Stereo feedback delay
//! - [`Filter`] - Resonant biquad (lowpass, highpass, bandpass)
//! - [`Distortion`] - Soft or hard waveshaping
//!
//! Note clips play through [`Tone`], a small polyphonic sine instrument.
//!
//! ## Example
//!
//! ```rust
//! use mixbus_core::{EffectChain, EffectSlot, StereoBuffer};
//! use mixbus_effects::{Distortion, Filter};
//!
//! let mut chain = EffectChain::new();
//! chain.push(EffectSlot::new("distortion", Box::new(Distortion::new(48000.0)), 48000.0, 256));
//! chain.push(EffectSlot::new("filter", Box::new(Filter::new(48000.0)), 48000.0, 256));
//!
//! let mut buffer = StereoBuffer::new(256);
//! chain.process(&mut buffer);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod amp;
pub mod delay;
pub mod distortion;
pub mod filter;
pub mod tone;

pub use amp::Amp;
pub use delay::Delay;
pub use distortion::{Distortion, WaveShape};
pub use filter::{Filter, FilterMode};
pub use tone::Tone;
