//! # Pipeline Data Model
//!
//! Every value here lives for exactly one pipeline run. Nothing is shared
//! between concurrent runs.

use crate::errors::{ErrorKind, FinderError};
use std::fmt;
use std::path::PathBuf;
use url::Url;
use uuid::Uuid;

/// The label returned when the recognition service reports no match.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// The extensions accepted both in the URL and, by family, in the file content.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// An inbound recognition request. `None` means the `url` parameter was absent.
#[derive(Debug, Clone, Default)]
pub struct RecognitionRequest {
    pub source_url: Option<String>,
}

impl RecognitionRequest {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: Some(source_url.into()),
        }
    }
}

/// A URL that passed syntactic and policy validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    pub url: Url,
    /// Lower-cased, always one of [`ALLOWED_EXTENSIONS`].
    pub extension: String,
}

/// Identifies a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The local copy of a remote image, owned by the run that created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    pub path: PathBuf,
    pub owner_run: RunId,
}

/// Image formats recognised by content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn ext(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
        }
    }
}

/// The true format of an artifact, determined from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffedType {
    pub kind: ImageKind,
}

impl SniffedType {
    pub fn ext(&self) -> &'static str {
        self.kind.ext()
    }
}

/// The normalized answer of the recognition service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    pub label: String,
}

impl RecognitionResult {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// The sentinel result for "no match".
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_LABEL)
    }

    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// The terminal value of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Success(RecognitionResult),
    Failure { kind: ErrorKind, message: String },
}

impl From<Result<RecognitionResult, FinderError>> for PipelineOutcome {
    fn from(result: Result<RecognitionResult, FinderError>) -> Self {
        match result {
            Ok(recognized) => PipelineOutcome::Success(recognized),
            Err(e) => PipelineOutcome::Failure {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

/// The states a pipeline run moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    Downloaded,
    Sniffed,
    Recognized,
    Cleaned,
    Responded,
    Errored,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Downloaded => "downloaded",
            Stage::Sniffed => "sniffed",
            Stage::Recognized => "recognized",
            Stage::Cleaned => "cleaned",
            Stage::Responded => "responded",
            Stage::Errored => "errored",
        };
        f.write_str(name)
    }
}
