//! # Pipeline Orchestration Tests
//!
//! These tests drive `FinderPipeline` with scripted components and check the
//! sequencing guarantees: which stages run, and that every artifact is cleaned
//! up exactly once.

use async_trait::async_trait;
use finder::{
    Downloader, ErrorKind, FinderError, FinderPipeline, LocalArtifact, PipelineOutcome,
    RecognitionRequest, RecognitionResult, Recognizer, RunId, ValidatedUrl,
};
use finder_test_utils::{html_bytes, jpeg_bytes, png_bytes, setup_tracing, RecordingCleanup};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// --- Scripted Components ---

/// Writes a fixed body to the destination, optionally failing afterwards.
struct FakeDownloader {
    body: Vec<u8>,
    fail_after_write: bool,
    calls: AtomicUsize,
}

impl FakeDownloader {
    fn serving(body: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            body,
            fail_after_write: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn truncating(body: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            body,
            fail_after_write: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(
        &self,
        _source: &ValidatedUrl,
        destination: &Path,
        owner_run: RunId,
    ) -> Result<LocalArtifact, FinderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(destination, &self.body)
            .await
            .map_err(|e| FinderError::Download(e.to_string()))?;
        if self.fail_after_write {
            return Err(FinderError::Download("connection reset".to_string()));
        }
        Ok(LocalArtifact {
            path: destination.to_path_buf(),
            owner_run,
        })
    }
}

/// Returns a scripted answer and records whether the artifact existed when called.
/// Without an answer it never returns.
struct FakeRecognizer {
    answer: Option<Result<RecognitionResult, FinderError>>,
    seen: Mutex<Vec<(PathBuf, bool)>>,
}

impl FakeRecognizer {
    fn answering(answer: Result<RecognitionResult, FinderError>) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(answer),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn stalled() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<(PathBuf, bool)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Recognizer for FakeRecognizer {
    async fn recognize(&self, path: &Path) -> Result<RecognitionResult, FinderError> {
        self.seen
            .lock()
            .unwrap()
            .push((path.to_path_buf(), path.exists()));
        match &self.answer {
            Some(answer) => answer.clone(),
            None => std::future::pending().await,
        }
    }
}

struct Harness {
    dir: TempDir,
    downloader: Arc<FakeDownloader>,
    recognizer: Arc<FakeRecognizer>,
    cleanup: RecordingCleanup,
    pipeline: FinderPipeline,
}

impl Harness {
    fn new(
        downloader: Arc<FakeDownloader>,
        answer: Result<RecognitionResult, FinderError>,
    ) -> Self {
        Self::with_recognizer(downloader, FakeRecognizer::answering(answer))
    }

    fn with_recognizer(downloader: Arc<FakeDownloader>, recognizer: Arc<FakeRecognizer>) -> Self {
        setup_tracing();
        let dir = tempfile::tempdir().unwrap();
        let cleanup = RecordingCleanup::new();
        let pipeline = FinderPipeline::builder()
            .download_dir(dir.path())
            .downloader(downloader.clone())
            .recognizer(recognizer.clone())
            .cleanup(Arc::new(cleanup.clone()))
            .build()
            .unwrap();
        Self {
            dir,
            downloader,
            recognizer,
            cleanup,
            pipeline,
        }
    }

    fn files_left(&self) -> usize {
        std::fs::read_dir(self.dir.path()).unwrap().count()
    }
}

// --- Validation Short-Circuits ---

#[tokio::test]
async fn test_missing_url_never_downloads() {
    let h = Harness::new(
        FakeDownloader::serving(jpeg_bytes()),
        Ok(RecognitionResult::new("x")),
    );

    for request in [RecognitionRequest::default(), RecognitionRequest::new("   ")] {
        let result = h.pipeline.find(&request).await;
        assert_eq!(result, Err(FinderError::MissingParameter));
    }

    assert_eq!(h.downloader.calls(), 0);
    assert_eq!(h.cleanup.total(), 0);
    assert!(h.recognizer.seen().is_empty());
}

#[tokio::test]
async fn test_invalid_url_never_downloads() {
    let h = Harness::new(
        FakeDownloader::serving(jpeg_bytes()),
        Ok(RecognitionResult::new("x")),
    );

    for raw in ["example.com/photo.jpg", "ftp://example.com/photo.jpg", "http://"] {
        let outcome = h.pipeline.run(&RecognitionRequest::new(raw)).await;
        assert_eq!(
            outcome,
            PipelineOutcome::Failure {
                kind: ErrorKind::InvalidUrl,
                message: "Url is invalid".to_string(),
            },
            "{raw}"
        );
    }

    assert_eq!(h.downloader.calls(), 0);
    assert_eq!(h.cleanup.total(), 0);
}

#[tokio::test]
async fn test_unsupported_extension_never_downloads() {
    let h = Harness::new(
        FakeDownloader::serving(jpeg_bytes()),
        Ok(RecognitionResult::new("x")),
    );

    let result = h
        .pipeline
        .find(&RecognitionRequest::new("http://example.com/photo.gif"))
        .await;

    assert_eq!(result, Err(FinderError::UnsupportedImageType));
    assert_eq!(h.downloader.calls(), 0);
    assert_eq!(h.cleanup.total(), 0);
}

// --- Post-Download Paths ---

#[tokio::test]
async fn test_success_cleans_up_after_recognition() {
    let h = Harness::new(
        FakeDownloader::serving(jpeg_bytes()),
        Ok(RecognitionResult::new("jane_smith")),
    );

    let outcome = h
        .pipeline
        .run(&RecognitionRequest::new("http://example.com/photo.jpg"))
        .await;

    assert_eq!(
        outcome,
        PipelineOutcome::Success(RecognitionResult::new("jane_smith"))
    );

    // The recognizer saw the artifact on disk; afterwards it is gone.
    let seen = h.recognizer.seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].1, "artifact should exist while recognition runs");
    assert!(seen[0].0.starts_with(h.dir.path()));
    assert_eq!(h.cleanup.calls().get(&seen[0].0), Some(&1));
    assert_eq!(h.cleanup.total(), 1);
    assert_eq!(h.files_left(), 0);
}

#[tokio::test]
async fn test_unknown_is_a_success() {
    let h = Harness::new(
        FakeDownloader::serving(png_bytes()),
        Ok(RecognitionResult::unknown()),
    );

    let result = h
        .pipeline
        .find(&RecognitionRequest::new("https://example.com/face.png"))
        .await
        .unwrap();

    assert!(result.is_unknown());
    assert_eq!(h.cleanup.total(), 1);
    assert_eq!(h.files_left(), 0);
}

#[tokio::test]
async fn test_spoofed_extension_is_rejected_and_cleaned() {
    let h = Harness::new(
        FakeDownloader::serving(html_bytes()),
        Ok(RecognitionResult::new("x")),
    );

    let result = h
        .pipeline
        .find(&RecognitionRequest::new("http://example.com/photo.jpg"))
        .await;

    assert_eq!(result, Err(FinderError::UnsupportedImageType));
    assert_eq!(h.downloader.calls(), 1);
    assert!(h.recognizer.seen().is_empty());
    assert_eq!(h.cleanup.total(), 1);
    assert_eq!(h.files_left(), 0);
}

#[tokio::test]
async fn test_partial_download_is_cleaned() {
    let h = Harness::new(
        FakeDownloader::truncating(jpeg_bytes()[..4].to_vec()),
        Ok(RecognitionResult::new("x")),
    );

    let result = h
        .pipeline
        .find(&RecognitionRequest::new("http://example.com/photo.jpeg"))
        .await;

    assert_eq!(
        result,
        Err(FinderError::Download("connection reset".to_string()))
    );
    assert!(h.recognizer.seen().is_empty());
    assert_eq!(h.cleanup.total(), 1);
    assert_eq!(h.files_left(), 0);
}

#[tokio::test]
async fn test_rpc_failure_is_cleaned() {
    let h = Harness::new(
        FakeDownloader::serving(jpeg_bytes()),
        Err(FinderError::Rpc("could not connect".to_string())),
    );

    let outcome = h
        .pipeline
        .run(&RecognitionRequest::new("http://example.com/photo.jpg"))
        .await;

    assert_eq!(
        outcome,
        PipelineOutcome::Failure {
            kind: ErrorKind::RpcError,
            message: "Recognition service call failed: could not connect".to_string(),
        }
    );
    assert_eq!(h.cleanup.total(), 1);
    assert_eq!(h.files_left(), 0);
}

#[tokio::test]
async fn test_cancelled_run_still_cleans_up() {
    let h = Harness::with_recognizer(
        FakeDownloader::serving(jpeg_bytes()),
        FakeRecognizer::stalled(),
    );

    let request = RecognitionRequest::new("http://example.com/photo.jpg");
    let result = tokio::time::timeout(Duration::from_millis(200), h.pipeline.find(&request)).await;
    assert!(result.is_err(), "the stalled run should time out");

    let seen = h.recognizer.seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].1, "artifact should exist while recognition runs");

    // Cleanup runs on a background task once the run is dropped.
    for _ in 0..100 {
        if h.cleanup.total() == 1 && h.files_left() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(h.cleanup.calls().get(&seen[0].0), Some(&1));
    assert_eq!(h.cleanup.total(), 1);
    assert_eq!(h.files_left(), 0);
}

// --- Concurrency ---

#[tokio::test]
async fn test_concurrent_runs_use_distinct_paths() {
    const RUNS: usize = 32;
    let h = Harness::new(
        FakeDownloader::serving(jpeg_bytes()),
        Ok(RecognitionResult::new("bob")),
    );

    let request = RecognitionRequest::new("http://example.com/photo.jpg");
    let results =
        futures::future::join_all((0..RUNS).map(|_| h.pipeline.find(&request))).await;

    assert!(results.iter().all(|r| r.as_ref().map(|r| r.label.as_str()) == Ok("bob")));

    let cleaned = h.cleanup.calls();
    assert_eq!(cleaned.len(), RUNS, "every run should use its own file name");
    assert!(cleaned.values().all(|&count| count == 1));
    assert_eq!(h.files_left(), 0);
}
