use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::{
    composition::TransitionStyle,
    error::{ConfigError, Result},
};

/// Main configuration for the Reel-Compositor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where inputs, intermediates and finished videos live
    pub paths: PathsConfig,

    /// Per-clip render settings
    pub video: VideoConfig,

    /// Final mux audio settings
    pub audio: AudioConfig,

    /// Scene timing and transition settings
    pub composition: CompositionConfig,

    /// Narration synthesis settings
    pub narration: NarrationConfig,

    /// Data and document source selection
    pub sources: SourcesConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.video.validate()?;
        self.audio.validate()?;
        self.composition.validate()?;
        self.narration.validate()?;
        Ok(())
    }
}

fn invalid<T: ToString>(key: &str, value: T) -> crate::error::ReelError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }.into()
}

/// Filesystem layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Finished videos, served by filename
    pub output_dir: PathBuf,

    /// Job-scoped working directories (`<work_dir>/<job_id>/...`)
    pub work_dir: PathBuf,

    /// Property JSON files and `images/` for the JSON data source
    pub input_dir: PathBuf,

    /// Narration cache
    pub cache_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            work_dir: PathBuf::from("temp"),
            input_dir: PathBuf::from("data/input"),
            cache_dir: PathBuf::from("temp/cache"),
        }
    }
}

impl PathsConfig {
    /// Working directory owned by one job
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.work_dir.join(job_id)
    }
}

/// Clip render configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// Output frame rate
    pub fps: u32,

    /// Video codec passed to the encoder
    pub codec: String,

    /// Encoder speed preset
    pub preset: String,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,

    /// Pixel format every clip is normalized to
    pub pixel_format: String,

    /// Slow continuous zoom on each still
    pub ken_burns: bool,

    /// Upper bound of the zoom factor
    pub zoom_ceiling: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            codec: "libx264".to_string(),
            preset: "medium".to_string(),
            quality: 55,
            pixel_format: "yuv420p".to_string(),
            ken_burns: true,
            zoom_ceiling: 1.3,
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        // yuv420p needs even dimensions
        if self.width == 0 || self.height == 0 || self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(invalid("video.resolution", format!("{}x{}", self.width, self.height)));
        }

        if self.fps == 0 || self.fps > 120 {
            return Err(invalid("video.fps", self.fps));
        }

        if self.quality > 100 {
            return Err(invalid("video.quality", self.quality));
        }

        if !(1.0..=4.0).contains(&self.zoom_ceiling) {
            return Err(invalid("video.zoom_ceiling", self.zoom_ceiling));
        }

        Ok(())
    }
}

/// Audio settings for the final mux
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Narration codec in the output container
    pub codec: String,

    /// Narration bitrate, encoder syntax (e.g. "192k")
    pub bitrate: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            codec: "aac".to_string(),
            bitrate: "192k".to_string(),
        }
    }
}

impl AudioConfig {
    fn validate(&self) -> Result<()> {
        if self.codec.trim().is_empty() {
            return Err(invalid("audio.codec", &self.codec));
        }
        if self.bitrate.trim().is_empty() {
            return Err(invalid("audio.bitrate", &self.bitrate));
        }
        Ok(())
    }
}

/// Scene timing and composition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// Transition style used when a job does not choose one
    pub transition: TransitionStyle,

    /// Cross-fade length in seconds
    pub transition_length: f64,

    /// Allowed drift between scene durations and narration before rescaling
    pub sync_tolerance: f64,

    /// ffmpeg executable
    pub ffmpeg_bin: String,

    /// ffprobe executable
    pub ffprobe_bin: String,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            transition: TransitionStyle::Fade,
            transition_length: 0.5,
            sync_tolerance: 0.5,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }
}

impl CompositionConfig {
    fn validate(&self) -> Result<()> {
        if !(self.transition_length > 0.0 && self.transition_length <= 5.0) {
            return Err(invalid("composition.transition_length", self.transition_length));
        }

        if self.sync_tolerance < 0.0 {
            return Err(invalid("composition.sync_tolerance", self.sync_tolerance));
        }

        Ok(())
    }
}

/// Which narration backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrationBackend {
    /// Near-silent audio sized from the script length
    Mock,
    /// External TTS program
    Command,
}

/// Voice settings handed to the synthesizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub name: String,
    pub language: String,
    pub speed: f32,
    pub pitch: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            language: "ko-KR".to_string(),
            speed: 1.0,
            pitch: 0.0,
        }
    }
}

/// Narration synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    pub backend: NarrationBackend,

    /// Program for the command backend
    pub program: Option<String>,

    /// Arguments; `{text_file}`, `{output}`, `{voice}`, `{language}`, `{speed}` and
    /// `{pitch}` are substituted
    pub args: Vec<String>,

    /// Extension of the audio the command backend writes
    pub output_extension: String,

    pub voice: VoiceConfig,

    /// Speaking rate used by the mock backend
    pub chars_per_minute: f64,

    /// Mock narration lower bound (seconds)
    pub min_duration: f64,

    /// Mock narration upper bound (seconds)
    pub max_duration: f64,

    /// Reuse narration for identical text + voice
    pub cache_enabled: bool,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            backend: NarrationBackend::Mock,
            program: None,
            args: vec![
                "--text-file".to_string(),
                "{text_file}".to_string(),
                "--out".to_string(),
                "{output}".to_string(),
            ],
            output_extension: "mp3".to_string(),
            voice: VoiceConfig::default(),
            chars_per_minute: 350.0,
            min_duration: 5.0,
            max_duration: 600.0,
            cache_enabled: true,
        }
    }
}

impl NarrationConfig {
    fn validate(&self) -> Result<()> {
        if self.backend == NarrationBackend::Command
            && self.program.as_deref().map_or(true, |p| p.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue {
                key: "narration.program".to_string(),
                value: "<missing>".to_string(),
            }.into());
        }

        if self.chars_per_minute <= 0.0 {
            return Err(invalid("narration.chars_per_minute", self.chars_per_minute));
        }

        if self.min_duration <= 0.0 || self.max_duration <= self.min_duration {
            return Err(invalid(
                "narration.duration_range",
                format!("{}-{}", self.min_duration, self.max_duration),
            ));
        }

        Ok(())
    }
}

/// Which property data source to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    Mock,
    Json,
}

impl std::str::FromStr for DataSourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown data source '{}' (expected mock or json)", other)),
        }
    }
}

/// Which document source to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSourceKind {
    Mock,
    Pdf,
}

/// Source selection and their settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub data: DataSourceKind,

    pub document: DocumentSourceKind,

    /// Channel name spoken in intros and closings
    pub channel_name: String,

    /// Page rasterization resolution for PDFs
    pub pdf_dpi: u32,

    pub pdftoppm_bin: String,

    pub pdftotext_bin: String,

    /// Pages produced by the mock document source
    pub mock_pages: usize,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            data: DataSourceKind::Mock,
            document: DocumentSourceKind::Mock,
            channel_name: "Auction TV".to_string(),
            pdf_dpi: 150,
            pdftoppm_bin: "pdftoppm".to_string(),
            pdftotext_bin: "pdftotext".to_string(),
            mock_pages: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("reel.toml");

        let mut original_config = Config::default();
        original_config.composition.transition = TransitionStyle::Dissolve;
        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded_config.video.fps, 30);
        assert_eq!(loaded_config.composition.transition, TransitionStyle::Dissolve);
        assert_eq!(loaded_config.narration.voice, original_config.narration.voice);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(&file_path, "[video]\nwidth = 1080\nheight = 1920\n").unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.video.width, 1080);
        assert_eq!(config.video.fps, 30);
        assert_eq!(config.composition.transition_length, 0.5);
    }

    #[test]
    fn test_odd_resolution_rejected() {
        let mut config = Config::default();
        config.video.width = 1921;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_command_backend_requires_program() {
        let mut config = Config::default();
        config.narration.backend = NarrationBackend::Command;
        assert!(config.validate().is_err());

        config.narration.program = Some("tts-cli".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file("/nonexistent/reel.toml");
        assert!(matches!(
            result,
            Err(crate::error::ReelError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
