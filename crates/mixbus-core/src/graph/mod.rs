//! Mixer channel graph.
//!
//! Channels form a directed acyclic graph through gain-scaled sends. Every
//! channel other than master starts with a unity send to master; further
//! sends (buses, parallel returns) are added with
//! [`ChannelGraph::add_send`], which rejects anything that would close a
//! loop.
//!
//! ```text
//!   Drums ──┐
//!           ├──► Bus ──► Master ──► device
//!   Bass  ──┘            ▲
//!   Vox   ───────────────┘
//! ```
//!
//! The graph itself never touches audio. [`ChannelGraph::compile`] turns it
//! into a [`RenderPlan`]: channels in topological order (ascending id among
//! independent channels) with their mix state and resolved sends.

mod channel;
mod plan;
mod routing;

pub use channel::{Channel, ChannelId, ChannelSend, MAX_SEND_GAIN, MAX_VOLUME};
pub use plan::{PlanSend, PlanStep, RenderPlan};
pub use routing::{ChannelGraph, CycleError, GraphError};
