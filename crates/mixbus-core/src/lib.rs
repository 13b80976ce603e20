//! mixbus core - mixer graph, effect chains, transport and tracks
//!
//! This crate holds the model and the real-time building blocks of the
//! mixbus engine. Nothing here spawns threads or touches devices; the
//! engine crate wires these pieces to an audio callback.
//!
//! # Core Abstractions
//!
//! ## Effects
//!
//! - [`Effect`] - Object-safe stereo processing trait
//! - [`ParameterInfo`] / [`ParamDescriptor`] - Parameter introspection
//! - [`EffectWithParams`] - Both of the above behind one trait object
//! - [`EffectChain`] / [`EffectSlot`] - Ordered slots with wet/dry, bypass
//!   and auto-shutoff on silence
//!
//! ## Mixer
//!
//! - [`ChannelGraph`] - Channels, sends and cycle rejection
//! - [`RenderPlan`] - Immutable render order snapshot for the audio thread
//!
//! ## Timeline
//!
//! - [`Transport`] - Sample clock with tempo, loop and stop policy
//! - [`Track`] / [`Lane`] / [`Clip`] - Clips on non-overlapping lanes
//! - [`Instrument`] - Note-driven sound source for note clips
//!
//! # no_std Support
//!
//! The crate needs only `alloc`. Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! mixbus-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use mixbus_core::{ChannelGraph, ChannelId};
//!
//! let mut graph = ChannelGraph::new();
//! let drums = graph.add_channel("Drums");
//! let bus = graph.add_channel("Bus");
//! graph.remove_send(drums, ChannelId::MASTER).unwrap();
//! graph.add_send(drums, bus, 0.8).unwrap();
//!
//! assert_eq!(graph.render_order(), vec![drums, bus, ChannelId::MASTER]);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod buffer;
pub mod chain;
pub mod effect;
pub mod effect_with_params;
pub mod graph;
pub mod instrument;
pub mod math;
pub mod param;
pub mod param_info;
pub mod track;
pub mod transport;

pub use buffer::StereoBuffer;
pub use chain::{DEFAULT_DECAY_MS, DEFAULT_GATE_DB, EffectChain, EffectSettings, EffectSlot, MAX_CHAIN_LEN};
pub use effect::Effect;
pub use effect_with_params::EffectWithParams;
pub use graph::{
    Channel, ChannelGraph, ChannelId, ChannelSend, CycleError, GraphError, PlanSend, PlanStep,
    RenderPlan,
};
pub use instrument::Instrument;
pub use math::{db_to_linear, flush_denormal, hard_clip, linear_to_db, pan_gains, peak, soft_clip, wet_dry_mix};
pub use param::SmoothedParam;
pub use param_info::{ParamDescriptor, ParamId, ParamUnit, ParameterInfo};
pub use track::{AudioClip, Clip, ClipContent, Lane, Note, Track, TrackError, TrackId};
pub use transport::{
    Advance, LoopRange, Segments, StopBehavior, TickTiming, Transport, TransportError,
    TransportState,
};
