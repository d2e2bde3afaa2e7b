//! # Common Test Utilities
//!
//! This module centralizes the test harness used across the `finder-server`
//! integration tests.
//!
//! - `TestApp`: spawns the real router on a random port, backed by an
//!   `httpmock::MockServer` that plays the remote image host and a
//!   `MockRecognitionServer` that plays the recognition service.

// Allow unused code because this is a test utility module, and not all
// functions might be used by every test file that includes it.
#![allow(unused)]

use anyhow::Result;
use finder::{FinderPipeline, HttpDownloader, RpcRecognizer};
use finder_server::{
    config::{self, AppConfig},
    router,
    state::app_state_with_pipeline,
};
use finder_test_utils::{setup_tracing, MockRecognitionServer, MockReply, RecordingCleanup};
use httpmock::MockServer;
use reqwest::Client;
use std::fs::File;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio::{net::TcpListener, task::JoinHandle};

/// A harness for end-to-end testing of the Axum server.
pub struct TestApp {
    pub address: String,
    pub client: Client,
    /// Serves the images the pipeline downloads.
    pub image_server: MockServer,
    pub recognition_server: Option<MockRecognitionServer>,
    pub cleanup: RecordingCleanup,
    pub config: AppConfig,
    download_dir: TempDir,
    _config_dir: TempDir,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestApp {
    /// Spawns the server with a recognition service that answers every call with `reply`.
    pub async fn spawn(reply: MockReply) -> Result<Self> {
        let recognition_server = MockRecognitionServer::start(reply).await?;
        let mut app = Self::spawn_with_rpc(recognition_server.addr).await?;
        app.recognition_server = Some(recognition_server);
        Ok(app)
    }

    /// Spawns the server pointed at an arbitrary recognition service address.
    pub async fn spawn_with_rpc(rpc_addr: SocketAddr) -> Result<Self> {
        setup_tracing();
        let image_server = MockServer::start_async().await;
        let download_dir = tempdir()?;

        let config_dir = tempdir()?;
        let config_path = config_dir.path().join("config.yml");
        let config_content = format!(
            r#"
api_host: "127.0.0.1"
api_port: 0
rpc_host: "{}"
rpc_port: {}
download_path: "{}"
download_timeout_secs: 5
rpc_connect_timeout_secs: 1
rpc_timeout_secs: 5
"#,
            rpc_addr.ip(),
            rpc_addr.port(),
            download_dir.path().to_str().unwrap(),
        );
        let mut file = File::create(&config_path)?;
        file.write_all(config_content.as_bytes())?;

        let config = config::get_config(Some(config_path.to_str().unwrap()))?;

        let cleanup = RecordingCleanup::new();
        let pipeline = FinderPipeline::builder()
            .download_dir(config.download_path.clone())
            .downloader(Arc::new(HttpDownloader::new(config.download_settings())?))
            .recognizer(Arc::new(RpcRecognizer::new(config.rpc_settings())))
            .cleanup(Arc::new(cleanup.clone()))
            .build()?;
        let app_state = app_state_with_pipeline(pipeline);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let address = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server_handle = tokio::spawn(async move {
            let app = router::create_router(app_state);
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(e) = server.await {
                tracing::error!("[TestApp] Server error: {}", e);
            }
        });

        Ok(Self {
            address,
            client: Client::new(),
            image_server,
            recognition_server: None,
            cleanup,
            config,
            download_dir,
            _config_dir: config_dir,
            _server_handle: server_handle,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Calls `GET /find`, passing `url` as the query parameter when given.
    pub async fn find(&self, url: Option<&str>) -> Result<reqwest::Response> {
        let mut request = self.client.get(format!("{}/find", self.address));
        if let Some(url) = url {
            request = request.query(&[("url", url)]);
        }
        Ok(request.send().await?)
    }

    /// Waits up to `timeout` for `condition` to hold, polling every 50ms.
    pub async fn wait_until(&self, timeout: Duration, condition: impl Fn(&Self) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if condition(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        condition(self)
    }

    /// The recognition calls observed so far.
    pub fn rpc_calls(&self) -> Vec<finder_test_utils::RecordedCall> {
        self.recognition_server
            .as_ref()
            .map(|server| server.calls())
            .unwrap_or_default()
    }

    pub fn download_dir(&self) -> &Path {
        self.download_dir.path()
    }

    /// Number of files currently in the download directory.
    pub fn files_left(&self) -> usize {
        std::fs::read_dir(self.download_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
