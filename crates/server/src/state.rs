//! # Application State
//!
//! This module defines the shared application state (`AppState`) and the logic
//! for building it at startup. The state holds the recognition pipeline, which
//! is shared by every request handler.

use crate::config::AppConfig;
use finder::{FinderPipeline, HttpDownloader, RpcRecognizer};
use std::sync::Arc;
use tracing::info;

/// The shared application state, accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The recognition pipeline. Holds no per-request state.
    pub pipeline: Arc<FinderPipeline>,
}

/// Builds the shared application state from the configuration.
///
/// This creates the download directory if needed and wires the HTTP
/// downloader and the RPC recognizer into the pipeline.
pub async fn build_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    tokio::fs::create_dir_all(&config.download_path)
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to create download directory '{}': {e}",
                config.download_path.display()
            )
        })?;

    let downloader = HttpDownloader::new(config.download_settings())?;
    let rpc_settings = config.rpc_settings();
    info!(
        rpc = %rpc_settings.address(),
        download_path = %config.download_path.display(),
        "Initialized recognition pipeline."
    );

    let pipeline = FinderPipeline::builder()
        .download_dir(config.download_path.clone())
        .downloader(Arc::new(downloader))
        .recognizer(Arc::new(RpcRecognizer::new(rpc_settings)))
        .build()?;

    Ok(app_state_with_pipeline(pipeline))
}

/// Builds the state around an already assembled pipeline.
pub fn app_state_with_pipeline(pipeline: FinderPipeline) -> AppState {
    AppState {
        pipeline: Arc::new(pipeline),
    }
}
