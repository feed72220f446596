//! # Scene Allocation
//!
//! Turns a narration script, an ordered image list and the measured narration
//! length into the timed scene sequence the composition engine renders.

pub mod allocator;
pub mod types;

pub use allocator::{rescale_durations, SceneAllocator, DEFAULT_SYNC_TOLERANCE};
pub use types::{spoken_chars, total_duration, NarrationTrack, Scene, ScriptSection};
