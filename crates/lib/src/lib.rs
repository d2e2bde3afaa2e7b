//! # Finder
//!
//! The request-processing core of the face recognition gateway. Given a
//! remote image URL, the pipeline validates it, downloads the image to a
//! uniquely named local artifact, confirms the real image type from its magic
//! bytes, asks the remote recognition service who is in it, and always
//! removes the artifact before returning.
//!
//! All components are passed to [`FinderPipeline`] explicitly through
//! [`FinderPipelineBuilder`], so each one can be replaced in tests.

pub mod cleanup;
pub mod download;
pub mod errors;
pub mod pipeline;
pub mod rpc;
pub mod sniff;
pub mod types;
pub mod validate;

pub use cleanup::{Cleanup, FsCleanup};
pub use download::{artifact_path, DownloadSettings, Downloader, HttpDownloader};
pub use errors::{BuildError, ErrorKind, FinderError};
pub use pipeline::{FinderPipeline, FinderPipelineBuilder};
pub use rpc::{Recognizer, RpcRecognizer, RpcSettings};
pub use sniff::{ContentSniffer, MagicSniffer};
pub use types::{
    LocalArtifact, PipelineOutcome, RecognitionRequest, RecognitionResult, RunId, SniffedType,
    Stage, ValidatedUrl, UNKNOWN_LABEL,
};
pub use validate::validate;
