use thiserror::Error;

use crate::pipeline::JobStatus;

/// Main error type for the Reel-Compositor library
#[derive(Error, Debug)]
pub enum ReelError {
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("No images available for the video")]
    NoImages,

    #[error("Job {job_id} has no cached images to regenerate from")]
    MissingInputs { job_id: String },

    #[error("Transition error: {0}")]
    Transition(#[from] TransitionError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Narration synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Job not found: {job_id}")]
    NotFound { job_id: String },

    #[error("No finished video named '{filename}'")]
    ArtifactNotFound { filename: String },

    #[error("Cannot {operation} job {job_id} while it is {status}")]
    InvalidState {
        job_id: String,
        status: JobStatus,
        operation: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Missing or unusable job inputs
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Property not found: {case_number}")]
    PropertyNotFound { case_number: String },

    #[error("Narration script is empty")]
    EmptyScript,

    #[error("Image not found for scene {scene}: {path}")]
    ImageMissing { scene: usize, path: String },

    #[error("Document unreadable: {path} - {reason}")]
    DocumentUnreadable { path: String, reason: String },

    #[error("Narration duration must be positive, got {duration}")]
    InvalidNarrationDuration { duration: f64 },

    #[error("Invalid property record: {details}")]
    InvalidRecord { details: String },
}

/// Failures on the cross-fade path. Always recovered by the hard-cut fallback.
#[derive(Error, Debug)]
pub enum TransitionError {
    #[error("Clip {index} has unusable duration {duration:.3}s")]
    InvalidClip { index: usize, duration: f64 },

    #[error("Could not probe clip {index}: {reason}")]
    ProbeFailed { index: usize, reason: String },

    #[error("Cross-fade render failed: {reason}")]
    RenderFailed { reason: String },
}

/// Encoder failures that no fallback can absorb
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("Encoder not available: {reason}")]
    EncoderUnavailable { reason: String },

    #[error("Failed to render clip for scene {scene}: {reason}")]
    ClipFailed { scene: usize, reason: String },

    #[error("Hard-cut concat failed after transition failure ({transition}): {reason}")]
    FallbackFailed { transition: String, reason: String },

    #[error("Concat failed: {reason}")]
    ConcatFailed { reason: String },

    #[error("Audio mux failed: {reason}")]
    MuxFailed { reason: String },

    #[error("Nothing to compose: {reason}")]
    EmptyTimeline { reason: String },
}

/// Narration backend failures
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Narration backend failed: {reason}")]
    BackendFailed { reason: String },

    #[error("Unreadable narration audio: {path}")]
    InvalidAudio { path: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using ReelError
pub type Result<T> = std::result::Result<T, ReelError>;

impl ReelError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Whether this error ends the current attempt when raised inside a phase
    pub fn is_job_fatal(&self) -> bool {
        !matches!(self, Self::Transition(_))
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Input(InputError::PropertyNotFound { case_number }) => {
                format!("No property data for case '{}'. Use `list` to see available cases.", case_number)
            }
            Self::Encoding(EncodingError::EncoderUnavailable { .. }) => {
                "FFmpeg not found. Please install FFmpeg and make sure it is on PATH.".to_string()
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            Self::NotFound { job_id } => format!("Job '{}' does not exist.", job_id),
            _ => self.to_string(),
        }
    }
}
