use serde::Serialize;
use thiserror::Error;

/// Errors produced while processing a single recognition request.
///
/// The `Display` text of each variant is the exact detail string returned to
/// API callers, so changing a message is a user-visible change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FinderError {
    #[error("Required parameter missing: url")]
    MissingParameter,
    #[error("Url is invalid")]
    InvalidUrl,
    #[error("Only jpg, jpeg, png files are allowed")]
    UnsupportedImageType,
    #[error("Failed to download image: {0}")]
    Download(String),
    #[error("Recognition service call failed: {0}")]
    Rpc(String),
}

/// The fieldless classification of a [`FinderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    MissingParameter,
    InvalidUrl,
    UnsupportedImageType,
    DownloadError,
    RpcError,
}

impl FinderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FinderError::MissingParameter => ErrorKind::MissingParameter,
            FinderError::InvalidUrl => ErrorKind::InvalidUrl,
            FinderError::UnsupportedImageType => ErrorKind::UnsupportedImageType,
            FinderError::Download(_) => ErrorKind::DownloadError,
            FinderError::Rpc(_) => ErrorKind::RpcError,
        }
    }
}

impl From<reqwest::Error> for FinderError {
    fn from(err: reqwest::Error) -> Self {
        FinderError::Download(err.to_string())
    }
}

/// Errors raised when a [`crate::FinderPipeline`] is assembled with missing parts.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("A download directory is required")]
    MissingDownloadDir,
    #[error("A downloader is required")]
    MissingDownloader,
    #[error("A recognizer is required")]
    MissingRecognizer,
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
