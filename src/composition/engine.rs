use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task;
use tracing::{debug, info, warn};

use crate::{
    composition::{
        encoder::MediaEncoder,
        transition::{CrossfadeGraph, TransitionSpec},
    },
    error::{EncodingError, InputError, ReelError, Result, TransitionError},
    scene::{total_duration, NarrationTrack, Scene},
};

const CONCAT_LIST: &str = "concat_list.txt";
const CONCATENATED: &str = "concatenated.mp4";
const MUXED: &str = "muxed.mp4";

/// Turns a timed scene list plus narration into one finished video
///
/// The engine follows a fixed pipeline:
/// 1. Clip Rendering - Hold each scene's image for its duration
/// 2. Scene Joining - Cross-fade the clips, or hard-cut concat as fallback
/// 3. Audio Mux - Lay the narration under the joined video
/// 4. Publish - Move the result into the output directory and clean up
pub struct CompositionEngine {
    encoder: Arc<dyn MediaEncoder>,
    output_dir: PathBuf,
}

/// How the scene clips were joined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMethod {
    Crossfade,
    Concat,
    ConcatFallback,
}

impl CompositionEngine {
    pub fn new<P: Into<PathBuf>>(encoder: Arc<dyn MediaEncoder>, output_dir: P) -> Self {
        Self {
            encoder,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Check the encoder can run before any job work is spent on it
    pub async fn check_encoder(&self) -> Result<()> {
        let encoder = Arc::clone(&self.encoder);
        run_blocking(move || encoder.check_available()).await?
    }

    /// Compose `scenes` over `narration` into `<output_dir>/<output_name>`
    ///
    /// Intermediates are written under `render_dir` and removed after a
    /// successful mux.
    pub async fn compose(
        &self,
        scenes: &[Scene],
        narration: &NarrationTrack,
        transition: TransitionSpec,
        render_dir: &Path,
        output_name: &str,
    ) -> Result<PathBuf> {
        info!("🎬 Composing {} scenes ({:.1}s) with '{}' transitions",
              scenes.len(), total_duration(scenes), transition.style);

        if scenes.is_empty() {
            return Err(EncodingError::EmptyTimeline {
                reason: "scene list is empty".to_string(),
            }.into());
        }

        for scene in scenes {
            if !scene.image_path.is_file() {
                return Err(InputError::ImageMissing {
                    scene: scene.index,
                    path: scene.image_path.display().to_string(),
                }.into());
            }
        }

        tokio::fs::create_dir_all(render_dir).await?;

        // Step 1: one clip per scene
        let clips = self.render_clips(scenes, render_dir).await?;

        // Step 2: join
        let joined = render_dir.join(CONCATENATED);
        let method = self.join_clips(&clips, transition, render_dir, &joined).await?;
        debug!("Joined {} clips via {:?}", clips.len(), method);

        // Step 3: narration
        info!("🔊 Muxing narration ({:.1}s)", narration.duration);
        let muxed = render_dir.join(MUXED);
        {
            let encoder = Arc::clone(&self.encoder);
            let (video, audio, out) = (joined.clone(), narration.path.clone(), muxed.clone());
            run_blocking(move || encoder.mux(&video, &audio, &out)).await??;
        }

        // Step 4: publish
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let artifact = self.output_dir.join(output_name);
        move_file(&muxed, &artifact).await?;

        let mut intermediates = clips;
        intermediates.push(joined);
        intermediates.push(render_dir.join(CONCAT_LIST));
        cleanup(&intermediates).await;

        info!("🎉 Video ready: {}", artifact.display());
        Ok(artifact)
    }

    async fn render_clips(&self, scenes: &[Scene], render_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut clips = Vec::with_capacity(scenes.len());

        for scene in scenes {
            let clip = render_dir.join(format!("scene_{:03}.mp4", scene.index));
            debug!("Rendering scene {} ({:.2}s) from {}",
                   scene.index, scene.duration, scene.image_path.display());

            let encoder = Arc::clone(&self.encoder);
            let (image, out, duration) = (scene.image_path.clone(), clip.clone(), scene.duration);
            run_blocking(move || encoder.render_still(&image, duration, &out))
                .await?
                .map_err(|e| match e {
                    ReelError::Encoding(inner) => ReelError::Encoding(inner),
                    other => EncodingError::ClipFailed {
                        scene: scene.index,
                        reason: other.to_string(),
                    }.into(),
                })?;

            clips.push(clip);
        }

        info!("   ✅ Rendered {} scene clips", clips.len());
        Ok(clips)
    }

    async fn join_clips(
        &self,
        clips: &[PathBuf],
        transition: TransitionSpec,
        render_dir: &Path,
        output: &Path,
    ) -> Result<JoinMethod> {
        let list_path = render_dir.join(CONCAT_LIST);

        if transition.style.is_cut() || clips.len() < 2 {
            self.concat(clips, &list_path, output).await?;
            return Ok(JoinMethod::Concat);
        }

        let encoder = Arc::clone(&self.encoder);
        let (inputs, out) = (clips.to_vec(), output.to_path_buf());
        let attempt = run_blocking(move || crossfade(encoder.as_ref(), &inputs, transition, &out)).await?;

        match attempt {
            Ok(graph) => {
                info!("   ✅ Cross-faded {} clips, {:.2}s", clips.len(), graph.expected_length());
                Ok(JoinMethod::Crossfade)
            }
            Err(transition_err) => {
                warn!("Transition failed, falling back to hard cuts: {}", transition_err);
                self.concat(clips, &list_path, output).await.map_err(|e| {
                    EncodingError::FallbackFailed {
                        transition: transition_err.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(JoinMethod::ConcatFallback)
            }
        }
    }

    async fn concat(&self, clips: &[PathBuf], list_path: &Path, output: &Path) -> Result<()> {
        let encoder = Arc::clone(&self.encoder);
        let (inputs, list, out) = (clips.to_vec(), list_path.to_path_buf(), output.to_path_buf());
        run_blocking(move || encoder.concat(&inputs, &list, &out)).await?
    }
}

/// Probe every clip, build the offset graph and render it
fn crossfade(
    encoder: &dyn MediaEncoder,
    clips: &[PathBuf],
    transition: TransitionSpec,
    output: &Path,
) -> std::result::Result<CrossfadeGraph, TransitionError> {
    let durations = clips
        .iter()
        .enumerate()
        .map(|(index, clip)| {
            encoder.probe_duration(clip).map_err(|e| TransitionError::ProbeFailed {
                index,
                reason: e.to_string(),
            })
        })
        .collect::<std::result::Result<Vec<f64>, _>>()?;

    let graph = CrossfadeGraph::build(durations, transition)?;
    debug!("Cross-fade offsets: {:?}", graph.offsets);
    encoder.crossfade(clips, &graph, output)?;
    Ok(graph)
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| ReelError::generic(format!("Encoder task failed: {}", e)))
}

/// Rename, or copy and remove when the rename crosses filesystems
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}

/// Remove intermediates; a file that is already gone counts as removed
async fn cleanup(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}
