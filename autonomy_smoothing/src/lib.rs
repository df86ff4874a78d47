//! # Autonomy Smoothing
//!
//! When a correction moves a remote character, its collision transform jumps to
//! the new location immediately while its visual transform keeps an offset that
//! decays over the following frames.

pub mod engine;
pub mod state;

pub use engine::{Correction, SmoothingEngine};
pub use state::{SmoothingState, VisualTransform};
