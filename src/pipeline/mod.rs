//! # Pipeline Module
//!
//! Job orchestration. A job moves through
//! `Pending → Processing → {ScriptReady | Completed | Failed}`; settled jobs
//! can be regenerated as a new attempt over their cached images. Every state
//! change is published as a [`ProgressEvent`].

pub mod job;
pub mod orchestrator;
pub mod progress;
pub mod store;

pub use job::{Advance, Job, JobInput, JobStatus};
pub use orchestrator::{Collaborators, Orchestrator};
pub use progress::{ProgressBroadcaster, ProgressEvent};
pub use store::JobStore;
