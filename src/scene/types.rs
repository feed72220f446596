use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One tagged slice of the narration script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSection {
    /// Section tag (`intro`, `price_info`, `part_3`, ...)
    pub tag: String,

    /// Narrated text of the section
    pub text: String,
}

impl ScriptSection {
    pub fn new<T: Into<String>, S: Into<String>>(tag: T, text: S) -> Self {
        Self {
            tag: tag.into(),
            text: text.into(),
        }
    }

    /// Characters that take narration time (whitespace and newlines excluded)
    pub fn spoken_chars(&self) -> usize {
        spoken_chars(&self.text)
    }
}

/// Count characters that take narration time
pub fn spoken_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// A timed (image, duration) unit of the output video
///
/// Scenes are built once per generation attempt and never mutated afterwards;
/// a regenerate allocates a fresh list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Render order, 0-based
    pub index: usize,

    /// Tag of the script section this scene narrates
    pub section: String,

    /// Narration slice spoken over this scene
    pub text: String,

    /// Seconds on screen (> 0)
    pub duration: f64,

    /// Still image held for the whole scene
    pub image_path: PathBuf,
}

impl Scene {
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }
}

/// Synthesized narration and its measured length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationTrack {
    pub path: PathBuf,

    /// Measured duration in seconds; the allocation target
    pub duration: f64,
}

impl NarrationTrack {
    pub fn new<P: Into<PathBuf>>(path: P, duration: f64) -> Self {
        Self {
            path: path.into(),
            duration,
        }
    }
}

/// Total on-screen time of a scene list
pub fn total_duration(scenes: &[Scene]) -> f64 {
    scenes.iter().map(|s| s.duration).sum()
}
