//! # Composition Module
//!
//! Renders timed scenes into per-scene clips, joins them with cross-fade
//! transitions (falling back to hard cuts) and muxes the narration.

pub mod encoder;
pub mod engine;
pub mod transition;

pub use encoder::{FfmpegEncoder, MediaEncoder};
pub use engine::{CompositionEngine, JoinMethod};
pub use transition::{
    crossfade_offsets, CrossfadeGraph, TransitionSpec, TransitionStyle, DEFAULT_TRANSITION_LENGTH,
    MIN_OFFSET_STEP,
};
