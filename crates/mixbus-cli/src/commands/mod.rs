//! CLI command implementations.

pub mod check;
pub mod common;
pub mod devices;
pub mod effects;
pub mod new;
pub mod play;
pub mod render;
