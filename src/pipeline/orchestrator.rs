use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    composition::{CompositionEngine, FfmpegEncoder, MediaEncoder, TransitionSpec, TransitionStyle},
    config::Config,
    error::{ReelError, Result},
    narration::{synthesizer_from_config, NarrationSynthesizer},
    pipeline::{
        job::{Advance, Job, JobInput, JobStatus},
        progress::{ProgressBroadcaster, ProgressEvent},
        store::JobStore,
    },
    scene::{NarrationTrack, Scene, SceneAllocator, ScriptSection},
    script::{sections_from_text, ScriptGenerator, TemplateScriptWriter},
    sources::{data_source_from_config, document_source_from_config, DataSource, DocumentSource},
};

/// External collaborators a job calls out to
#[derive(Clone)]
pub struct Collaborators {
    pub data: Arc<dyn DataSource>,
    pub documents: Arc<dyn DocumentSource>,
    pub scripts: Arc<dyn ScriptGenerator>,
    pub narration: Arc<dyn NarrationSynthesizer>,
    pub encoder: Arc<dyn MediaEncoder>,
}

impl Collaborators {
    /// Variants selected by configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            data: data_source_from_config(config),
            documents: document_source_from_config(config),
            scripts: Arc::new(TemplateScriptWriter::new(config.sources.channel_name.clone())),
            narration: synthesizer_from_config(config),
            encoder: Arc::new(FfmpegEncoder::from_config(config)),
        }
    }
}

/// Which phases an attempt runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pipeline {
    /// Property facts (or a supplied script) all the way to a video
    Case,
    /// Document pages and text, stopping for script review
    Document,
    /// Narration, scenes and video over cached images
    Render,
}

/// Per-job working directories under `<work_dir>/<job_id>/`
struct JobDirs {
    root: PathBuf,
    images: PathBuf,
    audio: PathBuf,
    render: PathBuf,
    document: PathBuf,
}

impl JobDirs {
    fn new(root: PathBuf) -> Self {
        Self {
            images: root.join("images"),
            audio: root.join("audio"),
            render: root.join("render"),
            document: root.join("document"),
            root,
        }
    }

    async fn create(&self) -> Result<()> {
        for dir in [&self.images, &self.audio, &self.render, &self.document] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}

/// Drives jobs through their phases and owns their state
///
/// Cheap to clone; clones share the store, the progress channel and the
/// collaborators. Operations that start an attempt spawn it on the current
/// tokio runtime and return immediately.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    store: Arc<JobStore>,
    progress: ProgressBroadcaster,
    collaborators: Collaborators,
    allocator: SceneAllocator,
    engine: CompositionEngine,
}

impl Orchestrator {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        Self::with_store(config, collaborators, Arc::new(JobStore::new()))
    }

    /// Orchestrator over an existing job table
    pub fn with_store(config: Config, collaborators: Collaborators, store: Arc<JobStore>) -> Self {
        let engine = CompositionEngine::new(
            Arc::clone(&collaborators.encoder),
            config.paths.output_dir.clone(),
        );
        let allocator = SceneAllocator::new(config.composition.sync_tolerance);

        Self {
            inner: Arc::new(Inner {
                config,
                store,
                progress: ProgressBroadcaster::default(),
                collaborators,
                allocator,
                engine,
            }),
        }
    }

    pub fn from_config(config: Config) -> Self {
        let collaborators = Collaborators::from_config(&config);
        Self::new(config, collaborators)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.inner.store
    }

    /// Register a job and start its first attempt
    pub fn create_job(&self, input: JobInput, transition: Option<TransitionStyle>) -> Result<String> {
        input.validate()?;

        let pipeline = match input {
            JobInput::Document { .. } => Pipeline::Document,
            JobInput::Case { .. } | JobInput::Script { .. } => Pipeline::Case,
        };
        let transition = transition.unwrap_or(self.inner.config.composition.transition);
        let job = Job::new(Uuid::new_v4().to_string(), input, transition);
        let job_id = job.id.clone();

        info!("🆕 Job {} created for '{}'", job_id, job.input.label());
        self.inner.progress.send(ProgressEvent::from_job(&job));
        self.inner.store.insert(job);

        self.spawn_attempt(job_id.clone(), 1, pipeline);
        Ok(job_id)
    }

    pub fn get_status(&self, job_id: &str) -> Result<Job> {
        self.inner
            .store
            .get(job_id)
            .ok_or_else(|| ReelError::NotFound { job_id: job_id.to_string() })
    }

    /// Newest first
    pub fn list_jobs(&self, limit: usize) -> Vec<Job> {
        self.inner.store.list(limit)
    }

    /// The script a settled job narrated, or is waiting to narrate
    pub fn review_script(&self, job_id: &str) -> Result<String> {
        let job = self.get_status(job_id)?;
        match (&job.script_text, job.status.is_settled()) {
            (Some(script), true) => Ok(script.clone()),
            _ => Err(job.invalid_state("review the script of")),
        }
    }

    /// Start a new attempt over the job's cached images
    ///
    /// `script` replaces the stored script and `transition` the stored style
    /// when given. The status check and the move to `Processing` happen in one
    /// store update, so of two concurrent calls at most one is accepted.
    pub fn regenerate(
        &self,
        job_id: &str,
        script: Option<String>,
        transition: Option<TransitionStyle>,
    ) -> Result<()> {
        // disk is checked on a snapshot, outside the store lock
        let snapshot = self.get_status(job_id)?;
        if snapshot.status.accepts_regenerate() && snapshot.missing_images() {
            return Err(ReelError::MissingInputs { job_id: job_id.to_string() });
        }

        let progress = &self.inner.progress;
        let attempt = self.inner.store.update(job_id, |job| {
            job.begin_regenerate(script, transition)?;
            progress.send(ProgressEvent::from_job(job));
            Ok(job.attempt)
        })?;

        info!("🔁 Job {} regenerating (attempt {})", job_id, attempt);
        self.spawn_attempt(job_id.to_string(), attempt, Pipeline::Render);
        Ok(())
    }

    /// Forget a settled job and remove its videos and working directory
    pub async fn delete_job(&self, job_id: &str) -> Result<()> {
        let job = self.inner.store.remove_if(job_id, |job| {
            if job.status.is_settled() {
                Ok(())
            } else {
                Err(job.invalid_state("delete"))
            }
        })?;

        for artifact in job.artifact_path.iter().chain(&job.superseded_artifacts) {
            remove_path(artifact, false).await?;
        }
        remove_path(&self.inner.config.paths.job_dir(job_id), true).await?;

        info!("🗑️  Job {} deleted", job_id);
        Ok(())
    }

    /// Path of a finished video in the output directory
    pub fn artifact(&self, filename: &str) -> Result<PathBuf> {
        let not_found = || ReelError::ArtifactNotFound { filename: filename.to_string() };

        let has_separator = filename.contains(|c: char| c == '/' || c == '\\');
        if filename.is_empty() || has_separator || filename.contains("..") {
            return Err(not_found());
        }

        let path = self.inner.config.paths.output_dir.join(filename);
        if path.is_file() {
            Ok(path)
        } else {
            Err(not_found())
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.inner.progress.subscribe()
    }

    /// Resolve once the job reaches `ScriptReady`, `Completed` or `Failed`
    pub async fn wait_until_settled(&self, job_id: &str) -> Result<Job> {
        // subscribe before reading so a settle in between is not missed
        let mut events = self.subscribe();

        loop {
            let job = self.get_status(job_id)?;
            if job.status.is_settled() {
                return Ok(job);
            }

            match events.recv().await {
                Ok(event) if event.job_id == job_id && event.status.is_settled() => {
                    return self.get_status(job_id);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Progress subscriber lagged by {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return self.get_status(job_id),
            }
        }
    }

    pub async fn check_encoder(&self) -> Result<()> {
        self.inner.engine.check_encoder().await
    }

    fn spawn_attempt(&self, job_id: String, attempt: u32, pipeline: Pipeline) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run_attempt(job_id, attempt, pipeline).await;
        });
    }
}

impl Inner {
    async fn run_attempt(&self, job_id: String, attempt: u32, pipeline: Pipeline) {
        info!("🚀 Job {} attempt {} started ({:?} pipeline)", job_id, attempt, pipeline);

        let outcome = match pipeline {
            Pipeline::Case => match self.run_case(&job_id, attempt).await {
                Ok(artifact) => self.complete_job(&job_id, attempt, artifact).await,
                Err(e) => Err(e),
            },
            Pipeline::Document => self.run_document(&job_id, attempt).await,
            Pipeline::Render => match self.run_render(&job_id, attempt).await {
                Ok(artifact) => self.complete_job(&job_id, attempt, artifact).await,
                Err(e) => Err(e),
            },
        };

        if let Err(err) = outcome {
            self.fail_job(&job_id, attempt, &err);
        }
    }

    /// Apply `f` to the job if `attempt` is still its current one, then publish
    fn update<T, F>(&self, job_id: &str, attempt: u32, f: F) -> Result<T>
    where
        F: FnOnce(&mut Job) -> Result<T>,
    {
        // published under the lock so events leave in the order they happened
        self.store.update(job_id, |job| {
            if job.attempt != attempt {
                return Err(job.invalid_state("update a superseded attempt of"));
            }
            let value = f(job)?;
            self.progress.send(ProgressEvent::from_job(job));
            Ok(value)
        })
    }

    fn advance(&self, job_id: &str, attempt: u32, progress: u8, step: &str) -> Result<()> {
        let outcome = self.update(job_id, attempt, |job| Ok(job.advance(progress, step)))?;

        match outcome {
            Advance::Applied => info!("   [{:>3}%] {}", progress, step),
            Advance::Regressed { current } => {
                warn!("Ignoring progress {} below {} for job {}", progress, current, job_id)
            }
        }
        Ok(())
    }

    /// Drop the videos this one replaces, then record it
    ///
    /// Old files go before the status change so a settled job never points
    /// at a removal still in flight. Videos that could not be removed stay
    /// listed for `delete_job`.
    async fn complete_job(&self, job_id: &str, attempt: u32, artifact: PathBuf) -> Result<()> {
        let mut kept = Vec::new();
        for old in self.snapshot(job_id)?.superseded_artifacts {
            // a regenerate within the same second reuses the output name
            if old == artifact {
                continue;
            }
            match remove_path(&old, false).await {
                Ok(()) => debug!("Removed superseded video {:?}", old),
                Err(e) => {
                    warn!("Could not remove superseded video {:?}: {}", old, e);
                    kept.push(old);
                }
            }
        }

        let shown = artifact.display().to_string();
        self.update(job_id, attempt, |job| {
            job.complete(artifact)?;
            job.superseded_artifacts = kept;
            Ok(())
        })?;
        info!("✅ Job {} completed: {}", job_id, shown);
        Ok(())
    }

    fn fail_job(&self, job_id: &str, attempt: u32, err: &ReelError) {
        debug_assert!(err.is_job_fatal(), "recoverable error reached job {}: {}", job_id, err);
        error!("❌ Job {} attempt {} failed: {}", job_id, attempt, err);

        if let Err(e) = self.update(job_id, attempt, |job| job.fail(err.to_string())) {
            warn!("Could not record failure of job {}: {}", job_id, e);
        }
    }

    fn snapshot(&self, job_id: &str) -> Result<Job> {
        self.store
            .get(job_id)
            .ok_or_else(|| ReelError::NotFound { job_id: job_id.to_string() })
    }

    fn dirs(&self, job_id: &str) -> JobDirs {
        JobDirs::new(self.config.paths.job_dir(job_id))
    }

    fn output_name(job_id: &str) -> String {
        format!("{}_{}.mp4", job_id, Utc::now().format("%Y%m%d_%H%M%S"))
    }

    async fn run_case(&self, job_id: &str, attempt: u32) -> Result<PathBuf> {
        let job = self.snapshot(job_id)?;
        let (case_number, supplied) = match &job.input {
            JobInput::Case { case_number } => (case_number.clone(), None),
            JobInput::Script { case_number, script } => (case_number.clone(), Some(script.clone())),
            JobInput::Document { .. } => return Err(job.invalid_state("run the case pipeline for")),
        };

        self.update(job_id, attempt, |job| job.transition_to(JobStatus::Processing, "start"))?;
        let dirs = self.dirs(job_id);
        dirs.create().await?;
        debug!("Job {} working in {}", job_id, dirs.root.display());

        self.advance(job_id, attempt, 10, "Fetching property data")?;
        let data = &self.collaborators.data;
        let record = data.get_property(&case_number).await?;

        self.advance(job_id, attempt, 25, "Preparing images")?;
        let images = data.fetch_images(&record, &dirs.images).await?;
        {
            let images = images.clone();
            self.update(job_id, attempt, move |job| {
                job.image_paths = images;
                Ok(())
            })?;
        }

        self.advance(job_id, attempt, 40, "Writing narration script")?;
        let (sections, text) = match supplied {
            Some(script) => (sections_from_text(&script), script),
            None => {
                let script = self.collaborators.scripts.generate(&record)?;
                (script.sections, script.full_text)
            }
        };
        {
            let text = text.clone();
            self.update(job_id, attempt, move |job| {
                job.script_text = Some(text);
                Ok(())
            })?;
        }

        self.advance(job_id, attempt, 55, "Synthesizing narration")?;
        let narration = self.synthesize(job_id, attempt, &text, &dirs).await?;

        self.advance(job_id, attempt, 70, "Allocating scenes")?;
        let scenes = self.allocate(job_id, &sections, &images, &narration)?;

        self.advance(job_id, attempt, 85, "Composing video")?;
        self.compose(job_id, &job, &scenes, &narration, &dirs).await
    }

    async fn run_document(&self, job_id: &str, attempt: u32) -> Result<()> {
        let job = self.snapshot(job_id)?;
        let reference = match &job.input {
            JobInput::Document { reference } => reference.clone(),
            _ => return Err(job.invalid_state("run the document pipeline for")),
        };

        self.update(job_id, attempt, |job| job.transition_to(JobStatus::Processing, "start"))?;
        let dirs = self.dirs(job_id);
        dirs.create().await?;

        let documents = &self.collaborators.documents;

        self.advance(job_id, attempt, 10, "Fetching document")?;
        let document = documents.fetch(&reference, &dirs.document).await?;

        self.advance(job_id, attempt, 25, "Extracting page images")?;
        let pages = documents.extract_pages(&document, &dirs.images).await?;
        {
            let pages = pages.clone();
            self.update(job_id, attempt, move |job| {
                job.image_paths = pages;
                Ok(())
            })?;
        }

        self.advance(job_id, attempt, 40, "Extracting page text")?;
        let mut texts = Vec::with_capacity(pages.len());
        for page in 1..=pages.len() {
            texts.push(documents.extract_text(&document, page).await?);
        }

        self.advance(job_id, attempt, 55, "Writing narration script")?;
        let script = self.collaborators.scripts.from_pages(&texts)?;

        self.update(job_id, attempt, move |job| {
            job.script_text = Some(script);
            job.publish_script()
        })?;
        info!("📝 Job {} script ready for review ({} pages)", job_id, pages.len());
        Ok(())
    }

    async fn run_render(&self, job_id: &str, attempt: u32) -> Result<PathBuf> {
        let job = self.snapshot(job_id)?;
        let text = job.script_text.clone().unwrap_or_default();
        let dirs = self.dirs(job_id);
        dirs.create().await?;

        self.advance(job_id, attempt, 20, "Synthesizing narration")?;
        let narration = self.synthesize(job_id, attempt, &text, &dirs).await?;

        self.advance(job_id, attempt, 50, "Allocating scenes")?;
        let sections = sections_from_text(&text);
        let scenes = self.allocate(job_id, &sections, &job.image_paths, &narration)?;

        self.advance(job_id, attempt, 70, "Composing video")?;
        self.compose(job_id, &job, &scenes, &narration, &dirs).await
    }

    async fn synthesize(&self, job_id: &str, attempt: u32, text: &str, dirs: &JobDirs) -> Result<NarrationTrack> {
        let synth = &self.collaborators.narration;
        let output = dirs.audio.join(format!("narration.{}", synth.extension()));

        let track = synth.synthesize(text, &self.config.narration.voice, &output).await?;
        debug!("Narration from {} backend: {:.2}s", synth.name(), track.duration);

        let path = track.path.clone();
        self.update(job_id, attempt, move |job| {
            job.narration_path = Some(path);
            Ok(())
        })?;
        Ok(track)
    }

    fn allocate(
        &self,
        job_id: &str,
        sections: &[ScriptSection],
        images: &[PathBuf],
        narration: &NarrationTrack,
    ) -> Result<Vec<Scene>> {
        let scenes = self.allocator.allocate(sections, images, narration.duration)?;
        debug!("Job {} allocated {} scenes", job_id, scenes.len());
        Ok(scenes)
    }

    async fn compose(
        &self,
        job_id: &str,
        job: &Job,
        scenes: &[Scene],
        narration: &NarrationTrack,
        dirs: &JobDirs,
    ) -> Result<PathBuf> {
        self.engine.check_encoder().await?;
        let transition = TransitionSpec::new(job.transition, self.config.composition.transition_length);
        self.engine
            .compose(scenes, narration, transition, &dirs.render, &Self::output_name(job_id))
            .await
    }
}

/// Remove a file or directory tree; a path that is already gone counts as removed
async fn remove_path(path: &Path, dir: bool) -> Result<()> {
    let removed = if dir {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match removed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EncodingError, InputError, TransitionError};
    use crate::narration::MockSynthesizer;
    use crate::sources::{MockDataSource, MockDocumentSource, PlaceholderRenderer};
    use crate::test_support::{
        read_duration, FailingSynthesizer, FakeEncoder, GatedSynthesizer, SilentSynthesizer,
    };
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    const CASE: &str = "2024타경12345";

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.output_dir = dir.path().join("output");
        config.paths.work_dir = dir.path().join("work");
        config.paths.cache_dir = dir.path().join("cache");
        config.narration.cache_enabled = false;
        config
    }

    fn collaborators(encoder: Arc<FakeEncoder>, narration: Arc<dyn NarrationSynthesizer>) -> Collaborators {
        let renderer = PlaceholderRenderer::new(160, 90);
        Collaborators {
            data: Arc::new(MockDataSource::new(renderer)),
            documents: Arc::new(MockDocumentSource::new(renderer, 2)),
            scripts: Arc::new(TemplateScriptWriter::new("Auction TV")),
            narration,
            encoder,
        }
    }

    fn orchestrator(dir: &TempDir) -> (Orchestrator, Arc<FakeEncoder>) {
        let encoder = Arc::new(FakeEncoder::default());
        let parts = collaborators(encoder.clone(), Arc::new(MockSynthesizer::default()));
        (Orchestrator::new(test_config(dir), parts), encoder)
    }

    async fn settle(orchestrator: &Orchestrator, job_id: &str) -> Job {
        tokio::time::timeout(Duration::from_secs(30), orchestrator.wait_until_settled(job_id))
            .await
            .expect("job did not settle")
            .unwrap()
    }

    fn case() -> JobInput {
        JobInput::Case { case_number: CASE.to_string() }
    }

    fn document() -> JobInput {
        JobInput::Document { reference: "appraisal.pdf".to_string() }
    }

    #[tokio::test]
    async fn test_case_job_completes() {
        let dir = tempdir().unwrap();
        let (orchestrator, encoder) = orchestrator(&dir);

        let id = orchestrator.create_job(case(), None).unwrap();
        let job = settle(&orchestrator, &id).await;

        assert_eq!(job.status, JobStatus::Completed, "{:?}", job.error);
        assert_eq!(job.progress, 100);
        assert_eq!(job.image_paths.len(), 4);
        assert!(job.script_text.as_deref().unwrap().contains("Auction TV"));
        assert!(job.narration_path.is_some());

        let artifact = job.artifact_path.clone().unwrap();
        let name = job.artifact_name().unwrap();
        assert!(name.starts_with(&id) && name.ends_with(".mp4"));
        assert_eq!(orchestrator.artifact(&name).unwrap(), artifact);
        assert!(read_duration(&artifact) > 0.0);
        assert_eq!(encoder.calls("crossfade"), 1);
    }

    #[tokio::test]
    async fn test_supplied_script_is_narrated_as_is() {
        let dir = tempdir().unwrap();
        let (orchestrator, _) = orchestrator(&dir);
        let script = "First paragraph.\n\nSecond paragraph.".to_string();

        let input = JobInput::Script { case_number: CASE.to_string(), script: script.clone() };
        let id = orchestrator.create_job(input, Some(TransitionStyle::None)).unwrap();
        let job = settle(&orchestrator, &id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.script_text, Some(script));
        assert_eq!(job.transition, TransitionStyle::None);
    }

    #[tokio::test]
    async fn test_blank_script_rejected_up_front() {
        let dir = tempdir().unwrap();
        let (orchestrator, _) = orchestrator(&dir);

        let input = JobInput::Script { case_number: CASE.to_string(), script: "  ".to_string() };
        assert!(matches!(
            orchestrator.create_job(input, None),
            Err(ReelError::Input(InputError::EmptyScript))
        ));
        assert!(orchestrator.list_jobs(10).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_case_fails_job() {
        let dir = tempdir().unwrap();
        let (orchestrator, _) = orchestrator(&dir);

        let input = JobInput::Case { case_number: "1999타경1".to_string() };
        let id = orchestrator.create_job(input, None).unwrap();
        let job = settle(&orchestrator, &id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("1999타경1"));
        assert!(job.artifact_path.is_none());
    }

    #[tokio::test]
    async fn test_document_job_stops_for_review() {
        let dir = tempdir().unwrap();
        let (orchestrator, encoder) = orchestrator(&dir);

        let id = orchestrator.create_job(document(), None).unwrap();
        let job = settle(&orchestrator, &id).await;

        assert_eq!(job.status, JobStatus::ScriptReady);
        assert_eq!(job.progress, 55);
        assert_eq!(job.image_paths.len(), 2);
        assert!(job.artifact_path.is_none());
        assert!(orchestrator.review_script(&id).unwrap().contains("544 million"));
        assert_eq!(encoder.calls("render"), 0);
    }

    #[tokio::test]
    async fn test_regenerate_with_edited_script() {
        let dir = tempdir().unwrap();
        let (orchestrator, _) = orchestrator(&dir);

        let id = orchestrator.create_job(document(), None).unwrap();
        settle(&orchestrator, &id).await;

        let edited = "An edited opening.\n\nAn edited close.".to_string();
        orchestrator.regenerate(&id, Some(edited.clone()), Some(TransitionStyle::Dissolve)).unwrap();
        assert_eq!(orchestrator.get_status(&id).unwrap().status, JobStatus::Processing);

        let job = settle(&orchestrator, &id).await;
        assert_eq!(job.status, JobStatus::Completed, "{:?}", job.error);
        assert_eq!(job.attempt, 2);
        assert_eq!(job.script_text, Some(edited));
        assert_eq!(job.transition, TransitionStyle::Dissolve);
        assert!(job.artifact_path.unwrap().is_file());
    }

    #[tokio::test]
    async fn test_review_script_before_settle_rejected() {
        let dir = tempdir().unwrap();
        let encoder = Arc::new(FakeEncoder::default());
        let gated = Arc::new(GatedSynthesizer::new());
        let orchestrator = Orchestrator::new(test_config(&dir), collaborators(encoder, gated.clone()));

        let id = orchestrator.create_job(case(), None).unwrap();
        assert!(matches!(
            orchestrator.review_script(&id),
            Err(ReelError::InvalidState { .. })
        ));
        assert!(matches!(
            orchestrator.regenerate(&id, None, None),
            Err(ReelError::InvalidState { .. })
        ));
        assert!(matches!(
            orchestrator.delete_job(&id).await,
            Err(ReelError::InvalidState { .. })
        ));

        gated.release();
        let job = settle(&orchestrator, &id).await;
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_regenerates_accept_one() {
        let dir = tempdir().unwrap();
        let encoder = Arc::new(FakeEncoder::default());
        let gated = Arc::new(GatedSynthesizer::new());
        let orchestrator = Orchestrator::new(test_config(&dir), collaborators(encoder, gated.clone()));

        let id = orchestrator.create_job(document(), None).unwrap();
        settle(&orchestrator, &id).await;

        let calls: Vec<_> = (0..2)
            .map(|_| {
                let orchestrator = orchestrator.clone();
                let id = id.clone();
                tokio::spawn(async move { orchestrator.regenerate(&id, None, None) })
            })
            .collect();

        let mut accepted = 0;
        for call in calls {
            match call.await.unwrap() {
                Ok(()) => accepted += 1,
                Err(e) => assert!(matches!(e, ReelError::InvalidState { .. })),
            }
        }
        assert_eq!(accepted, 1);

        gated.release();
        let job = settle(&orchestrator, &id).await;
        assert_eq!(job.attempt, 2);
    }

    #[tokio::test]
    async fn test_progress_events_are_monotonic_per_attempt() {
        let dir = tempdir().unwrap();
        let (orchestrator, _) = orchestrator(&dir);
        let mut events = orchestrator.subscribe();

        let id = orchestrator.create_job(document(), None).unwrap();
        settle(&orchestrator, &id).await;
        orchestrator.regenerate(&id, None, None).unwrap();
        settle(&orchestrator, &id).await;

        let mut last: Option<(u32, u8)> = None;
        let mut seen = 0;
        while let Ok(event) = events.try_recv() {
            if let Some((attempt, progress)) = last {
                if event.attempt == attempt {
                    assert!(event.progress >= progress, "{} after {}", event.progress, progress);
                } else {
                    assert_eq!(event.attempt, attempt + 1);
                }
            }
            last = Some((event.attempt, event.progress));
            seen += 1;
        }

        assert!(seen > 8);
        assert_eq!(last, Some((2, 100)));
    }

    #[tokio::test]
    async fn test_failed_job_keeps_inputs_for_regenerate() {
        let dir = tempdir().unwrap();
        let encoder = Arc::new(FakeEncoder::default());
        let orchestrator = Orchestrator::new(
            test_config(&dir),
            collaborators(encoder, Arc::new(FailingSynthesizer)),
        );

        let id = orchestrator.create_job(case(), None).unwrap();
        let job = settle(&orchestrator, &id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("voice offline"));
        assert!(job.script_text.is_some());
        assert_eq!(job.image_paths.len(), 4);
        assert_eq!(job.progress, 55);

        orchestrator.regenerate(&id, None, None).unwrap();
        let job = settle(&orchestrator, &id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempt, 2);
    }

    /// Steps a job published, in order
    fn steps(events: &mut broadcast::Receiver<ProgressEvent>, job_id: &str) -> Vec<(u8, String)> {
        let mut steps = Vec::new();
        while let Ok(event) = events.try_recv() {
            if event.job_id == job_id {
                steps.push((event.progress, event.step));
            }
        }
        steps
    }

    #[tokio::test]
    async fn test_allocation_failure_recorded_at_allocation_step() {
        let dir = tempdir().unwrap();
        let encoder = Arc::new(FakeEncoder::default());
        let orchestrator = Orchestrator::new(
            test_config(&dir),
            collaborators(encoder.clone(), Arc::new(SilentSynthesizer)),
        );
        let mut events = orchestrator.subscribe();

        let id = orchestrator.create_job(case(), None).unwrap();
        let job = settle(&orchestrator, &id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 70);
        assert!(job.error.as_deref().unwrap().contains("Narration duration must be positive"));
        assert_eq!(encoder.calls("render"), 0);

        let published = steps(&mut events, &id);
        let failed_at = published.iter().rposition(|(_, step)| step == "Allocating scenes").unwrap();
        assert_eq!(published[failed_at + 1], (70, "Failed".to_string()));
        assert!(published.iter().all(|(_, step)| step != "Composing video"), "{:?}", published);
    }

    #[tokio::test]
    async fn test_regenerate_allocation_failure_stops_before_compose() {
        let dir = tempdir().unwrap();
        let encoder = Arc::new(FakeEncoder::default());
        let orchestrator = Orchestrator::new(
            test_config(&dir),
            collaborators(encoder.clone(), Arc::new(SilentSynthesizer)),
        );

        let id = orchestrator.create_job(document(), None).unwrap();
        settle(&orchestrator, &id).await;

        let mut events = orchestrator.subscribe();
        orchestrator.regenerate(&id, None, None).unwrap();
        let job = settle(&orchestrator, &id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempt, 2);
        assert_eq!(job.progress, 50);
        assert!(steps(&mut events, &id).iter().all(|(_, step)| step != "Composing video"));
        assert_eq!(encoder.calls("render"), 0);
    }

    #[tokio::test]
    async fn test_regenerate_removes_superseded_video() {
        let dir = tempdir().unwrap();
        let (orchestrator, _) = orchestrator(&dir);

        let id = orchestrator.create_job(case(), None).unwrap();
        let first = settle(&orchestrator, &id).await.artifact_path.unwrap();

        // older video under a name the new attempt cannot reuse
        let stale = first.with_file_name(format!("{}_20000101_000000.mp4", id));
        std::fs::rename(&first, &stale).unwrap();
        orchestrator
            .store()
            .update(&id, |job| {
                job.artifact_path = Some(stale.clone());
                Ok(())
            })
            .unwrap();

        orchestrator.regenerate(&id, None, None).unwrap();
        let job = settle(&orchestrator, &id).await;

        assert_eq!(job.status, JobStatus::Completed, "{:?}", job.error);
        assert!(job.artifact_path.unwrap().is_file());
        assert!(!stale.exists());
        assert!(job.superseded_artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_superseded_videos() {
        let dir = tempdir().unwrap();
        let (orchestrator, encoder) = orchestrator(&dir);

        let id = orchestrator.create_job(case(), None).unwrap();
        let first = settle(&orchestrator, &id).await.artifact_path.unwrap();

        encoder.fail_mux();
        orchestrator.regenerate(&id, None, None).unwrap();
        let job = settle(&orchestrator, &id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.artifact_path.is_none());
        assert_eq!(job.superseded_artifacts, vec![first.clone()]);
        assert!(first.is_file());

        orchestrator.delete_job(&id).await.unwrap();
        assert!(!first.exists());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "recoverable error reached job")]
    fn test_transition_error_never_fails_a_job() {
        let dir = tempdir().unwrap();
        let (orchestrator, _) = orchestrator(&dir);
        let err = TransitionError::RenderFailed { reason: "xfade".into() }.into();
        orchestrator.inner.fail_job("job-1", 1, &err);
    }

    #[tokio::test]
    async fn test_regenerate_without_cached_images() {
        let dir = tempdir().unwrap();
        let (orchestrator, _) = orchestrator(&dir);

        let id = orchestrator.create_job(document(), None).unwrap();
        let job = settle(&orchestrator, &id).await;
        std::fs::remove_file(&job.image_paths[0]).unwrap();

        assert!(matches!(
            orchestrator.regenerate(&id, None, None),
            Err(ReelError::MissingInputs { .. })
        ));
        assert_eq!(orchestrator.get_status(&id).unwrap().status, JobStatus::ScriptReady);
    }

    #[tokio::test]
    async fn test_crossfade_failure_still_completes() {
        let dir = tempdir().unwrap();
        let (orchestrator, encoder) = orchestrator(&dir);
        encoder.fail_crossfade();

        let id = orchestrator.create_job(case(), None).unwrap();
        let job = settle(&orchestrator, &id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(encoder.calls("concat"), 1);
    }

    #[tokio::test]
    async fn test_missing_encoder_fails_job() {
        let dir = tempdir().unwrap();
        let (orchestrator, encoder) = orchestrator(&dir);
        encoder.unavailable();

        let id = orchestrator.create_job(case(), None).unwrap();
        let job = settle(&orchestrator, &id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(encoder.calls("render"), 0);
        assert!(matches!(
            orchestrator.check_encoder().await,
            Err(ReelError::Encoding(EncodingError::EncoderUnavailable { .. }))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_artifact_and_workdir() {
        let dir = tempdir().unwrap();
        let (orchestrator, _) = orchestrator(&dir);

        let id = orchestrator.create_job(case(), None).unwrap();
        let job = settle(&orchestrator, &id).await;
        let artifact = job.artifact_path.unwrap();
        let workdir = orchestrator.config().paths.job_dir(&id);
        assert!(workdir.is_dir());

        orchestrator.delete_job(&id).await.unwrap();
        assert!(!artifact.exists());
        assert!(!workdir.exists());
        assert!(matches!(orchestrator.get_status(&id), Err(ReelError::NotFound { .. })));
        assert!(matches!(orchestrator.delete_job(&id).await, Err(ReelError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_artifact_rejects_paths() {
        let dir = tempdir().unwrap();
        let (orchestrator, _) = orchestrator(&dir);

        for name in ["", "../secret.mp4", "a/b.mp4", "a\\b.mp4", "missing.mp4"] {
            assert!(matches!(
                orchestrator.artifact(name),
                Err(ReelError::ArtifactNotFound { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_list_jobs_newest_first() {
        let dir = tempdir().unwrap();
        let (orchestrator, _) = orchestrator(&dir);

        let first = orchestrator.create_job(document(), None).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = orchestrator.create_job(document(), None).unwrap();

        let jobs = orchestrator.list_jobs(10);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, second);
        assert_eq!(jobs[1].id, first);
        assert_eq!(orchestrator.list_jobs(1).len(), 1);

        settle(&orchestrator, &first).await;
        settle(&orchestrator, &second).await;
    }
}
