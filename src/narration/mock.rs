use async_trait::async_trait;
use std::f32::consts::PI;
use std::path::Path;
use tracing::debug;

use crate::config::VoiceConfig;
use crate::error::{InputError, Result, SynthesisError};
use crate::narration::NarrationSynthesizer;
use crate::scene::{spoken_chars, NarrationTrack};

const SAMPLE_RATE: u32 = 22050;
const TONE_HZ: f32 = 220.0;
/// -60 dB
const TONE_AMPLITUDE: f32 = 0.001;

/// Writes a near-silent tone whose length follows the speaking rate
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    chars_per_minute: f64,
    min_duration: f64,
    max_duration: f64,
}

impl MockSynthesizer {
    pub fn new(chars_per_minute: f64, min_duration: f64, max_duration: f64) -> Self {
        Self {
            chars_per_minute,
            min_duration,
            max_duration,
        }
    }

    /// Seconds a narrator needs for `text`, clamped to the configured range
    pub fn estimate_duration(&self, text: &str) -> f64 {
        let minutes = spoken_chars(text) as f64 / self.chars_per_minute;
        (minutes * 60.0).clamp(self.min_duration, self.max_duration)
    }

    fn write_tone(path: &Path, frames: u32) -> std::result::Result<(), hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path, spec)?;
        for n in 0..frames {
            let t = n as f32 / SAMPLE_RATE as f32;
            let sample = (2.0 * PI * TONE_HZ * t).sin() * TONE_AMPLITUDE;
            writer.write_sample((sample * i16::MAX as f32) as i16)?;
        }
        writer.finalize()
    }
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new(350.0, 5.0, 600.0)
    }
}

#[async_trait]
impl NarrationSynthesizer for MockSynthesizer {
    fn name(&self) -> &str {
        "mock"
    }

    fn extension(&self) -> &str {
        "wav"
    }

    async fn synthesize(&self, text: &str, _voice: &VoiceConfig, output: &Path) -> Result<NarrationTrack> {
        if text.trim().is_empty() {
            return Err(InputError::EmptyScript.into());
        }

        let frames = (self.estimate_duration(text) * SAMPLE_RATE as f64).round() as u32;
        let duration = frames as f64 / SAMPLE_RATE as f64;
        debug!("Mock narration: {} chars -> {:.2}s", spoken_chars(text), duration);

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let path = output.to_path_buf();
        tokio::task::spawn_blocking(move || Self::write_tone(&path, frames))
            .await
            .map_err(|e| SynthesisError::BackendFailed { reason: e.to_string() })?
            .map_err(|e| SynthesisError::BackendFailed { reason: e.to_string() })?;

        Ok(NarrationTrack::new(output, duration))
    }
}
