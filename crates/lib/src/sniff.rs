//! # Content-Type Sniffing
//!
//! Determines the real format of a downloaded artifact from its leading bytes,
//! independently of the extension the URL declared. A remote `photo.jpg` that
//! serves HTML is rejected here.

use crate::errors::FinderError;
use crate::types::{ImageKind, SniffedType};
use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Number of leading bytes inspected.
pub const SNIFF_LEN: usize = 12;

const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Inspects a local artifact and reports its true image type.
#[async_trait]
pub trait ContentSniffer: Send + Sync {
    async fn sniff(&self, path: &Path) -> Result<SniffedType, FinderError>;
}

/// Matches the artifact's prefix against known magic numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicSniffer;

#[async_trait]
impl ContentSniffer for MagicSniffer {
    async fn sniff(&self, path: &Path) -> Result<SniffedType, FinderError> {
        let prefix = read_prefix(path).await.map_err(|e| {
            FinderError::Download(format!(
                "downloaded image '{}' could not be read: {e}",
                path.display()
            ))
        })?;

        detect(&prefix)
            .map(|kind| SniffedType { kind })
            .ok_or(FinderError::UnsupportedImageType)
    }
}

/// Identifies an allowed image format from a byte prefix.
pub fn detect(prefix: &[u8]) -> Option<ImageKind> {
    if prefix.starts_with(JPEG_SIGNATURE) {
        Some(ImageKind::Jpeg)
    } else if prefix.starts_with(PNG_SIGNATURE) {
        Some(ImageKind::Png)
    } else {
        None
    }
}

// Reads up to SNIFF_LEN bytes; shorter files yield a shorter buffer.
async fn read_prefix(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut buf = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut buf).await?;
    Ok(buf)
}
