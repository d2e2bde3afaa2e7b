//! # Artifact Cleanup
//!
//! Removes a run's local artifact. Deletion is best-effort: failures are
//! logged and swallowed so they can never replace the run's real outcome.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

#[async_trait]
pub trait Cleanup: Send + Sync {
    /// Deletes the file at `path`. Never fails.
    async fn cleanup(&self, path: &Path);
}

/// Deletes artifacts from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCleanup;

#[async_trait]
impl Cleanup for FsCleanup {
    async fn cleanup(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Removed image"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No image to remove")
            }
            Err(e) => warn!(path = %path.display(), "Failed to remove image: {e}"),
        }
    }
}
