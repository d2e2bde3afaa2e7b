//! # Finder Test Utilities
//!
//! Shared helpers for the `finder` and `finder-server` test suites:
//!
//! - `MockRecognitionServer`: a zerorpc stand-in for the recognition service
//!   that answers every `find` call with a scripted reply and records what it
//!   saw.
//! - `RecordingCleanup`: a cleanup wrapper that counts calls per path.
//! - Minimal JPEG and PNG byte fixtures.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use finder::rpc::protocol::Event;
use finder::{Cleanup, FsCleanup};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use uuid::Uuid;
use zeromq::{Endpoint, RouterSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

static INIT: Once = Once::new();

/// Initializes a compact tracing subscriber once per test binary.
pub fn setup_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .compact()
            .try_init();
    });
}

// --- Image Fixtures ---

/// A tiny byte sequence starting with the JPEG SOI marker and a JFIF header.
pub fn jpeg_bytes() -> Vec<u8> {
    let mut bytes = vec![
        0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01,
    ];
    bytes.extend_from_slice(&[0u8; 64]);
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}

/// A tiny byte sequence starting with the PNG signature and an IHDR chunk header.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
        b'R',
    ];
    bytes.extend_from_slice(&[0u8; 32]);
    bytes
}

/// An HTML page, for serving under an image-looking URL.
pub fn html_bytes() -> Vec<u8> {
    b"<!DOCTYPE html><html><body>Not an image</body></html>".to_vec()
}

// --- Mock Recognition Server ---

/// How the mock server answers a `find` call.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// An `OK` event carrying `value`.
    Result(Value),
    /// An `ERR` event.
    Error { code: String, message: String },
    /// An arbitrary frame, sent verbatim.
    Raw(Vec<u8>),
    /// A heartbeat first, then an `OK` event carrying `value`.
    AfterHeartbeat(Value),
    /// Never answer.
    Hang,
}

/// A `find` call observed by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: PathBuf,
    /// Whether the file existed when the call arrived.
    pub file_existed: bool,
    /// ZeroMQ identity of the calling socket.
    pub peer: Vec<u8>,
}

/// A zerorpc server on a random local port, backed by a ZeroMQ `ROUTER` socket.
pub struct MockRecognitionServer {
    pub addr: SocketAddr,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    handle: JoinHandle<()>,
}

impl MockRecognitionServer {
    /// Starts a server that answers every call with `reply`.
    pub async fn start(reply: MockReply) -> Result<Self> {
        let mut socket = RouterSocket::new();
        let port = match socket.bind("tcp://127.0.0.1:0").await? {
            Endpoint::Tcp(_, port) => port,
            other => anyhow::bail!("unexpected endpoint {other:?}"),
        };
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let calls = Arc::new(Mutex::new(Vec::new()));

        let calls_for_task = calls.clone();
        let handle = tokio::spawn(async move {
            loop {
                let message = match socket.recv().await {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::warn!("[MockRecognitionServer] receive error: {e}");
                        break;
                    }
                };
                // Frames: peer identity, empty delimiter, event.
                let frames = message.into_vec();
                let (Some(peer), Some(payload)) = (frames.first(), frames.last()) else {
                    continue;
                };
                let Some(request) = Event::decode(payload) else {
                    tracing::warn!("[MockRecognitionServer] unreadable request");
                    continue;
                };

                let path = request
                    .args
                    .first()
                    .and_then(Value::as_str)
                    .map(PathBuf::from)
                    .unwrap_or_default();
                let file_existed = path.exists();
                calls_for_task.lock().unwrap().push(RecordedCall {
                    path,
                    file_existed,
                    peer: peer.to_vec(),
                });

                for frame in reply_frames(&request, &reply) {
                    let mut out = ZmqMessage::from(peer.clone());
                    out.push_back(Bytes::new());
                    out.push_back(Bytes::from(frame));
                    if let Err(e) = socket.send(out).await {
                        tracing::warn!("[MockRecognitionServer] send error: {e}");
                    }
                }
            }
        });

        Ok(Self {
            addr,
            calls,
            handle,
        })
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Returns the recorded calls.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Drop for MockRecognitionServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// The encoded events sent back for one request, in order.
fn reply_frames(request: &Event, reply: &MockReply) -> Vec<Vec<u8>> {
    let message_id = || Uuid::new_v4().to_string();
    let events = match reply {
        MockReply::Result(value) => vec![Event::ok(request, message_id(), value.clone())],
        MockReply::Error { code, message } => {
            vec![Event::err(request, message_id(), code, message)]
        }
        MockReply::AfterHeartbeat(value) => vec![
            Event::heartbeat(request, message_id()),
            Event::ok(request, message_id(), value.clone()),
        ],
        MockReply::Raw(raw) => return vec![raw.clone()],
        MockReply::Hang => return Vec::new(),
    };
    events
        .iter()
        .filter_map(|event| event.encode().ok())
        .collect()
}

/// Returns a local address nothing is listening on.
pub async fn unused_local_addr() -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

// --- Recording Cleanup ---

/// Deletes files like `FsCleanup` and counts how often each path was cleaned.
#[derive(Debug, Clone, Default)]
pub struct RecordingCleanup {
    calls: Arc<Mutex<HashMap<PathBuf, usize>>>,
}

impl RecordingCleanup {
    pub fn new() -> Self {
        Self::default()
    }

    /// All cleaned paths with their call counts.
    pub fn calls(&self) -> HashMap<PathBuf, usize> {
        self.calls.lock().unwrap().clone()
    }

    /// Total number of cleanup calls.
    pub fn total(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Cleanup for RecordingCleanup {
    async fn cleanup(&self, path: &Path) {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_insert(0) += 1;
        FsCleanup.cleanup(path).await;
    }
}
