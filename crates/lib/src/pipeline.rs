//! # Pipeline Orchestrator
//!
//! Composes validation, download, sniffing, recognition and cleanup into one
//! request flow:
//!
//! `Received → Validated → Downloaded → Sniffed → Recognized → Cleaned → Responded`
//!
//! Any stage may short-circuit to `Errored`. Once a run has attempted a
//! download, its artifact path is cleaned up exactly once before the run
//! returns, whether it succeeded, failed or was cancelled.

use crate::cleanup::{Cleanup, FsCleanup};
use crate::download::{artifact_path, Downloader};
use crate::errors::{BuildError, FinderError};
use crate::rpc::Recognizer;
use crate::sniff::{ContentSniffer, MagicSniffer};
use crate::types::{
    PipelineOutcome, RecognitionRequest, RecognitionResult, RunId, Stage, ValidatedUrl,
};
use crate::validate::validate;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// The end-to-end recognition pipeline.
///
/// Holds only immutable configuration and stateless components, so one
/// instance is shared by all concurrent requests.
#[derive(Clone)]
pub struct FinderPipeline {
    download_dir: PathBuf,
    downloader: Arc<dyn Downloader>,
    sniffer: Arc<dyn ContentSniffer>,
    recognizer: Arc<dyn Recognizer>,
    cleanup: Arc<dyn Cleanup>,
}

impl fmt::Debug for FinderPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinderPipeline")
            .field("download_dir", &self.download_dir)
            .finish_non_exhaustive()
    }
}

impl FinderPipeline {
    pub fn builder() -> FinderPipelineBuilder {
        FinderPipelineBuilder::new()
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Runs the pipeline and folds the result into a [`PipelineOutcome`].
    pub async fn run(&self, request: &RecognitionRequest) -> PipelineOutcome {
        self.find(request).await.into()
    }

    /// Runs the pipeline for one request.
    pub async fn find(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResult, FinderError> {
        let run_id = RunId::new();
        self.execute(run_id, request)
            .instrument(info_span!("find", run_id = %run_id))
            .await
    }

    async fn execute(
        &self,
        run_id: RunId,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResult, FinderError> {
        debug!(stage = %Stage::Received);

        // No artifact exists yet, so a validation failure needs no cleanup.
        let validated = validate(request.source_url.as_deref()).inspect_err(|e| {
            debug!(stage = %Stage::Errored, "Rejected request: {e}");
        })?;
        info!("Received URL {}", validated.url);
        debug!(stage = %Stage::Validated, extension = %validated.extension);

        let artifact = ArtifactGuard::new(
            artifact_path(&self.download_dir, &validated.extension),
            self.cleanup.clone(),
        );
        let result = self.process(run_id, &validated, artifact.path()).await;

        artifact.release().await;
        debug!(stage = %Stage::Cleaned);

        match &result {
            Ok(recognized) => {
                info!(name = %recognized.label, "Recognition finished");
                debug!(stage = %Stage::Responded);
            }
            Err(e) => {
                warn!("Recognition failed: {e}");
                debug!(stage = %Stage::Errored);
            }
        }
        result
    }

    // Download, sniff and recognize. Cleanup is the caller's job.
    async fn process(
        &self,
        run_id: RunId,
        validated: &ValidatedUrl,
        path: &Path,
    ) -> Result<RecognitionResult, FinderError> {
        let artifact = self
            .downloader
            .download(validated, path, run_id)
            .await?;
        debug!(stage = %Stage::Downloaded, path = %artifact.path.display());

        let sniffed = self.sniffer.sniff(&artifact.path).await?;
        debug!(stage = %Stage::Sniffed, ext = sniffed.ext());

        let recognized = self.recognizer.recognize(&artifact.path).await?;
        debug!(stage = %Stage::Recognized, name = %recognized.label);

        Ok(recognized)
    }
}

/// Owns a run's artifact path and hands it to [`Cleanup`] exactly once.
///
/// A run that finishes calls [`ArtifactGuard::release`]. A run whose future is
/// dropped first (for example when the HTTP client disconnects) cleans up from
/// `Drop` on a background task instead.
struct ArtifactGuard {
    path: PathBuf,
    cleanup: Arc<dyn Cleanup>,
    armed: bool,
}

impl ArtifactGuard {
    fn new(path: PathBuf, cleanup: Arc<dyn Cleanup>) -> Self {
        Self {
            path,
            cleanup,
            armed: true,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn release(mut self) {
        self.armed = false;
        self.cleanup.cleanup(&self.path).await;
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(path = %self.path.display(), "Run cancelled, removing artifact in the background");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let path = self.path.clone();
                let cleanup = self.cleanup.clone();
                handle.spawn(async move { cleanup.cleanup(&path).await }.in_current_span());
            }
            Err(_) => {
                if let Err(e) = std::fs::remove_file(&self.path) {
                    debug!(path = %self.path.display(), "Could not remove artifact: {e}");
                }
            }
        }
    }
}

/// Assembles a [`FinderPipeline`] from explicit components.
///
/// The sniffer defaults to [`MagicSniffer`] and cleanup to [`FsCleanup`].
#[derive(Default)]
pub struct FinderPipelineBuilder {
    download_dir: Option<PathBuf>,
    downloader: Option<Arc<dyn Downloader>>,
    sniffer: Option<Arc<dyn ContentSniffer>>,
    recognizer: Option<Arc<dyn Recognizer>>,
    cleanup: Option<Arc<dyn Cleanup>>,
}

impl FinderPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory artifacts are written to.
    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    pub fn downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn sniffer(mut self, sniffer: Arc<dyn ContentSniffer>) -> Self {
        self.sniffer = Some(sniffer);
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn cleanup(mut self, cleanup: Arc<dyn Cleanup>) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    /// Builds the pipeline, failing if a required component is missing.
    pub fn build(self) -> Result<FinderPipeline, BuildError> {
        Ok(FinderPipeline {
            download_dir: self.download_dir.ok_or(BuildError::MissingDownloadDir)?,
            downloader: self.downloader.ok_or(BuildError::MissingDownloader)?,
            sniffer: self.sniffer.unwrap_or_else(|| Arc::new(MagicSniffer)),
            recognizer: self.recognizer.ok_or(BuildError::MissingRecognizer)?,
            cleanup: self.cleanup.unwrap_or_else(|| Arc::new(FsCleanup)),
        })
    }
}
