//! # Artifact Download
//!
//! Fetches a validated image URL into a uniquely named file inside the
//! download directory. Uniqueness comes from a fresh 64-byte random token per
//! file, so concurrent runs never need to coordinate.

use crate::errors::{BuildError, FinderError};
use crate::types::{LocalArtifact, RunId, ValidatedUrl};
use async_trait::async_trait;
use rand::RngCore;
use reqwest::Client as ReqwestClient;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Number of random bytes in an artifact file name (hex-encoded to twice as many characters).
pub const ARTIFACT_TOKEN_BYTES: usize = 64;

/// Builds `{dir}/{hex(64 random bytes)}.{extension}`.
pub fn artifact_path(dir: &Path, extension: &str) -> PathBuf {
    let mut token = [0u8; ARTIFACT_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut token);
    dir.join(format!("{}.{extension}", hex::encode(token)))
}

/// Fetches remote bytes to a local path.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Writes the body of `source` to `destination`.
    ///
    /// On failure a partially written file may remain at `destination`; the
    /// caller is responsible for cleaning it up.
    async fn download(
        &self,
        source: &ValidatedUrl,
        destination: &Path,
        owner_run: RunId,
    ) -> Result<LocalArtifact, FinderError>;
}

/// Limits applied to every download.
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// A [`Downloader`] backed by `reqwest`, streaming the body chunk by chunk.
#[derive(Clone, Debug)]
pub struct HttpDownloader {
    client: ReqwestClient,
    max_bytes: u64,
}

impl HttpDownloader {
    pub fn new(settings: DownloadSettings) -> Result<Self, BuildError> {
        let client = ReqwestClient::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .build()?;
        Ok(Self {
            client,
            max_bytes: settings.max_bytes,
        })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(
        &self,
        source: &ValidatedUrl,
        destination: &Path,
        owner_run: RunId,
    ) -> Result<LocalArtifact, FinderError> {
        let mut response = self.client.get(source.url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FinderError::Download(format!(
                "request failed with status: {status}"
            )));
        }
        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(too_large(self.max_bytes));
            }
        }

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| write_error(destination, e))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(too_large(self.max_bytes));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| write_error(destination, e))?;
        }
        file.flush().await.map_err(|e| write_error(destination, e))?;

        debug!(path = %destination.display(), bytes = written, "Image downloaded");
        Ok(LocalArtifact {
            path: destination.to_path_buf(),
            owner_run,
        })
    }
}

fn too_large(limit: u64) -> FinderError {
    FinderError::Download(format!("image exceeds the {limit} byte limit"))
}

fn write_error(path: &Path, err: std::io::Error) -> FinderError {
    FinderError::Download(format!("could not write '{}': {err}", path.display()))
}
