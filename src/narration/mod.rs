//! # Narration Module
//!
//! Speech synthesis behind the [`NarrationSynthesizer`] trait. The mock backend
//! writes near-silent audio sized from the script length; the command backend
//! shells out to a configured TTS program. Either can be wrapped in a
//! file cache keyed by text and voice.

pub mod cache;
pub mod command;
pub mod mock;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, NarrationBackend, VoiceConfig};
use crate::error::Result;
use crate::scene::NarrationTrack;

pub use cache::{CachedSynthesizer, NarrationCache};
pub use command::CommandSynthesizer;
pub use mock::MockSynthesizer;

/// Turns narration text into an audio file with a measured duration
#[async_trait]
pub trait NarrationSynthesizer: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Extension of the files this backend writes
    fn extension(&self) -> &str;

    /// Write narration for `text` to `output` and measure it
    async fn synthesize(&self, text: &str, voice: &VoiceConfig, output: &Path) -> Result<NarrationTrack>;
}

/// Build the configured backend, cached when enabled
pub fn synthesizer_from_config(config: &Config) -> Arc<dyn NarrationSynthesizer> {
    let narration = &config.narration;

    let backend: Arc<dyn NarrationSynthesizer> = match narration.backend {
        NarrationBackend::Mock => Arc::new(MockSynthesizer::new(
            narration.chars_per_minute,
            narration.min_duration,
            narration.max_duration,
        )),
        NarrationBackend::Command => Arc::new(CommandSynthesizer::new(
            narration.program.clone().unwrap_or_default(),
            narration.args.clone(),
            narration.output_extension.clone(),
        )),
    };

    if narration.cache_enabled {
        Arc::new(CachedSynthesizer::new(
            backend,
            NarrationCache::new(config.paths.cache_dir.join("narration")),
        ))
    } else {
        backend
    }
}
