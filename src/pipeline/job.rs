use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::composition::TransitionStyle;
use crate::error::{InputError, ReelError, Result};

/// Lifecycle of a generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    /// Document pipeline stopped for the user to review the script
    ScriptReady,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::ScriptReady => "script_ready",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// No attempt is running and none will start on its own
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::ScriptReady | Self::Completed | Self::Failed)
    }

    pub fn accepts_regenerate(&self) -> bool {
        self.is_settled()
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, ScriptReady)
                | (Processing, Completed)
                | (Processing, Failed)
                | (ScriptReady, Processing)
                | (Completed, Processing)
                | (Failed, Processing)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a job was asked to turn into a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobInput {
    /// Property case number; the script is generated
    Case { case_number: String },
    /// Appraisal document; stops at `ScriptReady`
    Document { reference: String },
    /// Property case number with a script written by the user
    Script { case_number: String, script: String },
}

impl JobInput {
    /// Short description for logs and listings
    pub fn label(&self) -> &str {
        match self {
            Self::Case { case_number } | Self::Script { case_number, .. } => case_number,
            Self::Document { reference } => reference,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Case { case_number } if case_number.trim().is_empty() => {
                Err(InputError::PropertyNotFound { case_number: case_number.clone() }.into())
            }
            Self::Document { reference } if reference.trim().is_empty() => {
                Err(InputError::DocumentUnreadable {
                    path: reference.clone(),
                    reason: "empty document reference".to_string(),
                }
                .into())
            }
            Self::Script { script, .. } if script.trim().is_empty() => Err(InputError::EmptyScript.into()),
            _ => Ok(()),
        }
    }
}

/// One video generation job
///
/// Owned by the orchestrator's store; callers only ever see clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    /// 0-100, non-decreasing within one attempt
    pub progress: u8,
    pub current_step: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub input: JobInput,
    pub transition: TransitionStyle,
    /// 1-based; every regenerate starts a new attempt
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_text: Option<String>,
    #[serde(default)]
    pub image_paths: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration_path: Option<PathBuf>,
    /// Set only after a successful mux
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Videos of earlier attempts still in the output directory
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub superseded_artifacts: Vec<PathBuf>,
}

/// Result of a progress update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Applied,
    /// Lower than the current progress; only the step label was kept
    Regressed { current: u8 },
}

impl Job {
    pub fn new(id: String, input: JobInput, transition: TransitionStyle) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            progress: 0,
            current_step: "Queued".to_string(),
            created_at: now,
            updated_at: now,
            input,
            transition,
            attempt: 1,
            script_text: None,
            image_paths: Vec::new(),
            narration_path: None,
            artifact_path: None,
            error: None,
            superseded_artifacts: Vec::new(),
        }
    }

    pub fn invalid_state(&self, operation: &str) -> ReelError {
        ReelError::InvalidState {
            job_id: self.id.clone(),
            status: self.status,
            operation: operation.to_string(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Move to `next` if the lifecycle allows it
    pub fn transition_to(&mut self, next: JobStatus, operation: &str) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(self.invalid_state(operation));
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Record progress; a lower value than the current one is not applied
    pub fn advance(&mut self, progress: u8, step: &str) -> Advance {
        let progress = progress.min(100);
        self.current_step = step.to_string();
        self.touch();

        if progress < self.progress {
            return Advance::Regressed { current: self.progress };
        }
        self.progress = progress;
        Advance::Applied
    }

    pub fn complete(&mut self, artifact: PathBuf) -> Result<()> {
        self.transition_to(JobStatus::Completed, "complete")?;
        self.progress = 100;
        self.current_step = "Completed".to_string();
        self.artifact_path = Some(artifact);
        self.error = None;
        Ok(())
    }

    /// Script and images stay so the job can be regenerated
    pub fn fail(&mut self, message: String) -> Result<()> {
        self.transition_to(JobStatus::Failed, "fail")?;
        self.current_step = "Failed".to_string();
        self.error = Some(message);
        Ok(())
    }

    pub fn publish_script(&mut self) -> Result<()> {
        self.transition_to(JobStatus::ScriptReady, "publish script for")?;
        self.current_step = "Waiting for script review".to_string();
        Ok(())
    }

    /// Whether a cached image is gone from disk
    ///
    /// Touches the filesystem, so call it on a snapshot, not under the store lock.
    pub fn missing_images(&self) -> bool {
        self.image_paths.iter().any(|p| !p.is_file())
    }

    /// Start a new attempt from cached images
    ///
    /// Checks and state change happen together so that callers holding the
    /// store's write lock get compare-and-swap semantics. Only in-memory state
    /// is checked; see [`Job::missing_images`] for the files themselves.
    pub fn begin_regenerate(&mut self, script: Option<String>, transition: Option<TransitionStyle>) -> Result<()> {
        if !self.status.accepts_regenerate() {
            return Err(self.invalid_state("regenerate"));
        }

        if self.image_paths.is_empty() {
            return Err(ReelError::MissingInputs { job_id: self.id.clone() });
        }

        let script = script.or_else(|| self.script_text.clone()).unwrap_or_default();
        if script.trim().is_empty() {
            return Err(InputError::EmptyScript.into());
        }

        self.transition_to(JobStatus::Processing, "regenerate")?;
        self.attempt += 1;
        self.progress = 0;
        self.current_step = "Queued for regeneration".to_string();
        self.script_text = Some(script);
        if let Some(previous) = self.artifact_path.take() {
            self.superseded_artifacts.push(previous);
        }
        self.error = None;
        if let Some(style) = transition {
            self.transition = style;
        }
        Ok(())
    }

    /// File name of the finished video, if any
    pub fn artifact_name(&self) -> Option<String> {
        self.artifact_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }
}
