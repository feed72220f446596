//! # Reel-Compositor
//!
//! Turn property facts, appraisal documents or a hand-written script into a
//! narrated slideshow video.
//!
//! A job fetches its inputs, writes (or takes) a narration script, synthesizes
//! the narration, spreads its duration across the available images and renders
//! one continuous video with cross-fade transitions. Document jobs pause after
//! the script is written so it can be reviewed and edited before rendering.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reel_compositor::{
//!     config::Config,
//!     pipeline::{JobInput, JobStatus, Orchestrator},
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let orchestrator = Orchestrator::from_config(Config::default());
//!
//! let job_id = orchestrator.create_job(
//!     JobInput::Case { case_number: "2024타경12345".to_string() },
//!     None,
//! )?;
//!
//! let job = orchestrator.wait_until_settled(&job_id).await?;
//! if job.status == JobStatus::Completed {
//!     println!("Video at {:?}", job.artifact_path);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`pipeline`] - Job state machine, job store and progress events
//! - [`scene`] - Narration time allocation across images
//! - [`composition`] - Clip rendering, cross-fades and the hard-cut fallback
//! - [`narration`] - Speech synthesis backends
//! - [`script`] - Narration script writing
//! - [`sources`] - Property data and document sources
//! - [`audio`] - Narration duration probing
//! - [`config`] - Configuration management
//!
//! ## Custom Collaborators
//!
//! Every external dependency of a job sits behind a trait. Implement
//! [`NarrationSynthesizer`](narration::NarrationSynthesizer) to plug in a
//! different speech backend:
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use reel_compositor::{
//!     config::VoiceConfig, narration::NarrationSynthesizer, scene::NarrationTrack, Result,
//! };
//! use std::path::Path;
//!
//! struct MyVoice;
//!
//! #[async_trait]
//! impl NarrationSynthesizer for MyVoice {
//!     fn name(&self) -> &str {
//!         "my_voice"
//!     }
//!
//!     fn extension(&self) -> &str {
//!         "wav"
//!     }
//!
//!     async fn synthesize(&self, text: &str, voice: &VoiceConfig, output: &Path) -> Result<NarrationTrack> {
//!         // Your synthesis here
//!         Ok(NarrationTrack::new(output, 10.0))
//!     }
//! }
//! ```

pub mod audio;
pub mod composition;
pub mod config;
pub mod error;
pub mod narration;
pub mod pipeline;
pub mod scene;
pub mod script;
pub mod sources;

#[cfg(test)]
mod test_support;

// Re-export commonly used types for convenience
pub use crate::{
    composition::{CompositionEngine, TransitionSpec, TransitionStyle},
    config::Config,
    error::{ReelError, Result},
    pipeline::{Job, JobInput, JobStatus, Orchestrator},
    scene::{Scene, SceneAllocator},
};
