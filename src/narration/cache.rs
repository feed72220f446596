use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::audio::AudioLoader;
use crate::config::VoiceConfig;
use crate::error::Result;
use crate::narration::NarrationSynthesizer;
use crate::scene::NarrationTrack;

/// Narration files keyed by text and voice settings
#[derive(Debug, Clone)]
pub struct NarrationCache {
    dir: PathBuf,
}

impl NarrationCache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable key for one (text, voice) pair
    pub fn key(text: &str, voice: &VoiceConfig) -> String {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        voice.name.hash(&mut hasher);
        voice.language.hash(&mut hasher);
        voice.speed.to_bits().hash(&mut hasher);
        voice.pitch.to_bits().hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    pub fn path_for(&self, text: &str, voice: &VoiceConfig, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", Self::key(text, voice), extension))
    }
}

/// Serves repeated narration requests from the cache
pub struct CachedSynthesizer {
    inner: Arc<dyn NarrationSynthesizer>,
    cache: NarrationCache,
}

impl CachedSynthesizer {
    pub fn new(inner: Arc<dyn NarrationSynthesizer>, cache: NarrationCache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl NarrationSynthesizer for CachedSynthesizer {
    fn name(&self) -> &str {
        "cached"
    }

    fn extension(&self) -> &str {
        self.inner.extension()
    }

    async fn synthesize(&self, text: &str, voice: &VoiceConfig, output: &Path) -> Result<NarrationTrack> {
        let cached = self.cache.path_for(text, voice, self.inner.extension());

        if cached.is_file() {
            match AudioLoader::duration(&cached).await {
                Ok(duration) => {
                    debug!("Narration cache hit: {}", cached.display());
                    if let Some(parent) = output.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::copy(&cached, output).await?;
                    return Ok(NarrationTrack::new(output, duration));
                }
                Err(e) => warn!("Ignoring unreadable cached narration {}: {}", cached.display(), e),
            }
        }

        let track = self.inner.synthesize(text, voice, output).await?;

        // a failed cache write never fails the job
        if let Err(e) = store(&track.path, &cached).await {
            warn!("Failed to cache narration: {}", e);
        }

        Ok(track)
    }
}

async fn store(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(from, to).await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narration::MockSynthesizer;
    use crate::test_support::CountingSynthesizer;
    use tempfile::tempdir;

    #[test]
    fn test_key_depends_on_text_and_voice() {
        let voice = VoiceConfig::default();
        let faster = VoiceConfig { speed: 1.5, ..VoiceConfig::default() };

        assert_eq!(NarrationCache::key("hello", &voice), NarrationCache::key("hello", &voice));
        assert_ne!(NarrationCache::key("hello", &voice), NarrationCache::key("hello!", &voice));
        assert_ne!(NarrationCache::key("hello", &voice), NarrationCache::key("hello", &faster));
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_cache() {
        let dir = tempdir().unwrap();
        let inner = Arc::new(CountingSynthesizer::new(MockSynthesizer::default()));
        let cached = CachedSynthesizer::new(inner.clone(), NarrationCache::new(dir.path().join("cache")));
        let voice = VoiceConfig::default();

        let first = cached.synthesize("same text", &voice, &dir.path().join("a/n.wav")).await.unwrap();
        let second = cached.synthesize("same text", &voice, &dir.path().join("b/n.wav")).await.unwrap();

        assert_eq!(inner.count(), 1);
        assert!(second.path.exists());
        assert!((first.duration - second.duration).abs() < 1e-3);

        cached.synthesize("other text", &voice, &dir.path().join("c/n.wav")).await.unwrap();
        assert_eq!(inner.count(), 2);
    }
}
