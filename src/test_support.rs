//! Fakes shared by the unit tests: an encoder that writes durations instead of
//! video, and narration backends that count, fail or wait.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::audio::AudioLoader;
use crate::composition::encoder::write_concat_list;
use crate::composition::{CrossfadeGraph, MediaEncoder};
use crate::config::VoiceConfig;
use crate::error::{EncodingError, ReelError, Result, SynthesisError, TransitionError};
use crate::narration::{MockSynthesizer, NarrationSynthesizer};
use crate::scene::NarrationTrack;

#[derive(Default)]
struct FakeState {
    calls: HashMap<&'static str, usize>,
    zero_clips: Vec<usize>,
    fail_crossfade: bool,
    fail_concat: bool,
    fail_mux: bool,
    unavailable: bool,
}

/// Encoder whose "media" files hold their duration as text
#[derive(Default)]
pub struct FakeEncoder {
    state: Mutex<FakeState>,
}

impl FakeEncoder {
    fn record(&self, call: &'static str) -> std::sync::MutexGuard<'_, FakeState> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(call).or_insert(0) += 1;
        state
    }

    pub fn calls(&self, call: &str) -> usize {
        self.state.lock().unwrap().calls.get(call).copied().unwrap_or(0)
    }

    /// Clip for scene `index` comes out with zero length
    pub fn zero_duration_clip(&self, index: usize) {
        self.state.lock().unwrap().zero_clips.push(index);
    }

    pub fn fail_crossfade(&self) {
        self.state.lock().unwrap().fail_crossfade = true;
    }

    pub fn fail_concat(&self) {
        self.state.lock().unwrap().fail_concat = true;
    }

    pub fn fail_mux(&self) {
        self.state.lock().unwrap().fail_mux = true;
    }

    pub fn unavailable(&self) {
        self.state.lock().unwrap().unavailable = true;
    }
}

fn write_duration(path: &Path, seconds: f64) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, seconds.to_string())?;
    Ok(())
}

fn scene_index(path: &Path) -> Option<usize> {
    path.file_stem()?.to_str()?.strip_prefix("scene_")?.parse().ok()
}

impl MediaEncoder for FakeEncoder {
    fn check_available(&self) -> Result<()> {
        if self.state.lock().unwrap().unavailable {
            return Err(EncodingError::EncoderUnavailable { reason: "fake ffmpeg missing".into() }.into());
        }
        Ok(())
    }

    fn render_still(&self, image: &Path, duration: f64, output: &Path) -> Result<()> {
        let state = self.record("render");
        assert!(image.is_file(), "render of missing image {}", image.display());

        let zero = scene_index(output).map_or(false, |i| state.zero_clips.contains(&i));
        write_duration(output, if zero { 0.0 } else { duration })
    }

    fn crossfade(
        &self,
        _clips: &[PathBuf],
        graph: &CrossfadeGraph,
        output: &Path,
    ) -> std::result::Result<(), TransitionError> {
        let state = self.record("crossfade");
        if state.fail_crossfade {
            return Err(TransitionError::RenderFailed { reason: "fake xfade error".into() });
        }
        write_duration(output, graph.expected_length())
            .map_err(|e| TransitionError::RenderFailed { reason: e.to_string() })
    }

    fn concat(&self, clips: &[PathBuf], list_path: &Path, output: &Path) -> Result<()> {
        let fail = self.record("concat").fail_concat;
        if fail {
            return Err(EncodingError::ConcatFailed { reason: "fake concat error".into() }.into());
        }

        write_concat_list(clips, list_path)?;
        let total = clips.iter().map(|c| read_duration(c)).sum::<f64>();
        write_duration(output, total)
    }

    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let fail = self.record("mux").fail_mux;
        if fail {
            return Err(EncodingError::MuxFailed { reason: "fake mux error".into() }.into());
        }

        // engine tests pass text narration, pipeline tests real WAVs
        let as_text = std::fs::read_to_string(audio).ok().and_then(|s| s.trim().parse::<f64>().ok());
        let audio_duration = match as_text {
            Some(seconds) => seconds,
            None => AudioLoader::probe_blocking(audio)?.duration,
        };
        write_duration(output, read_duration(video).min(audio_duration))
    }

    fn probe_duration(&self, media: &Path) -> Result<f64> {
        drop(self.record("probe"));
        std::fs::read_to_string(media)
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .ok_or_else(|| ReelError::generic(format!("not a fake clip: {}", media.display())))
    }
}

/// Duration written by [`FakeEncoder`]
pub fn read_duration(path: &Path) -> f64 {
    std::fs::read_to_string(path).unwrap().trim().parse().unwrap()
}

/// Small real PNG at `dir/name`
pub fn write_image(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::from_pixel(4, 4, image::Rgb([40, 80, 120])).save(&path).unwrap();
    path
}

/// Counts calls through to the wrapped backend
pub struct CountingSynthesizer<S> {
    inner: S,
    count: AtomicUsize,
}

impl<S> CountingSynthesizer<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, count: AtomicUsize::new(0) }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: NarrationSynthesizer> NarrationSynthesizer for CountingSynthesizer<S> {
    fn name(&self) -> &str {
        "counting"
    }

    fn extension(&self) -> &str {
        self.inner.extension()
    }

    async fn synthesize(&self, text: &str, voice: &VoiceConfig, output: &Path) -> Result<NarrationTrack> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.inner.synthesize(text, voice, output).await
    }
}

/// Backend that is always down
pub struct FailingSynthesizer;

#[async_trait]
impl NarrationSynthesizer for FailingSynthesizer {
    fn name(&self) -> &str {
        "failing"
    }

    fn extension(&self) -> &str {
        "wav"
    }

    async fn synthesize(&self, _text: &str, _voice: &VoiceConfig, _output: &Path) -> Result<NarrationTrack> {
        Err(SynthesisError::BackendFailed { reason: "voice offline".into() }.into())
    }
}

/// Backend that writes a file but reports zero-length narration
pub struct SilentSynthesizer;

#[async_trait]
impl NarrationSynthesizer for SilentSynthesizer {
    fn name(&self) -> &str {
        "silent"
    }

    fn extension(&self) -> &str {
        "wav"
    }

    async fn synthesize(&self, _text: &str, _voice: &VoiceConfig, output: &Path) -> Result<NarrationTrack> {
        write_duration(output, 0.0)?;
        Ok(NarrationTrack::new(output.to_path_buf(), 0.0))
    }
}

/// Mock backend that holds every call until released
pub struct GatedSynthesizer {
    inner: MockSynthesizer,
    gate: Notify,
}

impl GatedSynthesizer {
    pub fn new() -> Self {
        Self { inner: MockSynthesizer::default(), gate: Notify::new() }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl NarrationSynthesizer for GatedSynthesizer {
    fn name(&self) -> &str {
        "gated"
    }

    fn extension(&self) -> &str {
        self.inner.extension()
    }

    async fn synthesize(&self, text: &str, voice: &VoiceConfig, output: &Path) -> Result<NarrationTrack> {
        self.gate.notified().await;
        self.inner.synthesize(text, voice, output).await
    }
}
