//! # Recognition Client
//!
//! Calls the remote `find` procedure of a zerorpc service with the local
//! artifact path and normalizes whatever comes back into a
//! [`RecognitionResult`].
//!
//! Each call connects its own ZeroMQ `DEALER` socket and drops it before
//! returning, whatever the outcome. There is no pooling.

pub mod protocol;

use crate::errors::FinderError;
use crate::types::RecognitionResult;
use async_trait::async_trait;
use bytes::Bytes;
use protocol::{Event, REPLY_ERR, REPLY_OK};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;
use zeromq::{DealerSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

/// Resolves the identity shown in a local image.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, path: &Path) -> Result<RecognitionResult, FinderError>;
}

/// Connection settings for [`RpcRecognizer`].
#[derive(Debug, Clone)]
pub struct RpcSettings {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub call_timeout: Duration,
}

impl RpcSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The ZeroMQ endpoint, `tcp://host:port`.
    pub fn endpoint(&self) -> String {
        format!("tcp://{}", self.address())
    }
}

/// A [`Recognizer`] speaking zerorpc over a ZeroMQ `DEALER` socket.
#[derive(Debug, Clone)]
pub struct RpcRecognizer {
    settings: RpcSettings,
}

impl RpcRecognizer {
    pub fn new(settings: RpcSettings) -> Self {
        Self { settings }
    }

    // Sends one request and waits for its answer, skipping heartbeats.
    // `None` means the reply was unreadable.
    async fn call(
        &self,
        socket: &mut DealerSocket,
        request: &Event,
    ) -> Result<Option<Event>, FinderError> {
        let payload = request
            .encode()
            .map_err(|e| FinderError::Rpc(format!("failed to encode request: {e}")))?;

        // Empty delimiter frame, then the event.
        let mut message = ZmqMessage::from(Bytes::new());
        message.push_back(Bytes::from(payload));
        socket
            .send(message)
            .await
            .map_err(|e| FinderError::Rpc(format!("failed to send request: {e}")))?;

        loop {
            let message = match socket.recv().await {
                Ok(message) => message,
                Err(e) => {
                    warn!("Failed to read recognition reply: {e}");
                    return Ok(None);
                }
            };
            let Some(frame) = message.into_vec().pop() else {
                continue;
            };
            let Some(event) = Event::decode(&frame) else {
                warn!(bytes = frame.len(), "Discarding unreadable recognition reply");
                return Ok(None);
            };
            if event.is_heartbeat() {
                continue;
            }
            match event.header.response_to.as_deref() {
                Some(id) if id != request.header.message_id => {
                    debug!(response_to = id, "Ignoring reply to another request");
                }
                _ => return Ok(Some(event)),
            }
        }
    }
}

#[async_trait]
impl Recognizer for RpcRecognizer {
    async fn recognize(&self, path: &Path) -> Result<RecognitionResult, FinderError> {
        let endpoint = self.settings.endpoint();
        let mut socket = DealerSocket::new();
        timeout(self.settings.connect_timeout, socket.connect(&endpoint))
            .await
            .map_err(|_| FinderError::Rpc(format!("timed out connecting to {endpoint}")))?
            .map_err(|e| FinderError::Rpc(format!("could not connect to {endpoint}: {e}")))?;

        let request = Event::find(Uuid::new_v4().to_string(), &path.to_string_lossy());

        // The socket is dropped when this function returns or is cancelled,
        // which closes the connection on every path.
        let reply = timeout(self.settings.call_timeout, self.call(&mut socket, &request))
            .await
            .map_err(|_| {
                FinderError::Rpc(format!(
                    "no reply from {endpoint} within {:?}",
                    self.settings.call_timeout
                ))
            })??;

        debug!(reply = ?reply, "Recognition reply received");
        Ok(interpret_reply(reply.as_ref()))
    }
}

/// Turns a reply event into a result. Anything unusable is a "no match".
pub fn interpret_reply(reply: Option<&Event>) -> RecognitionResult {
    let Some(reply) = reply else {
        return RecognitionResult::unknown();
    };
    match reply.name.as_str() {
        REPLY_OK => normalize_label(reply.args.first()),
        REPLY_ERR => {
            debug!(error = ?reply.args, "Recognition service reported an error");
            RecognitionResult::unknown()
        }
        other => {
            debug!(event = other, "Unexpected recognition reply");
            RecognitionResult::unknown()
        }
    }
}

/// Normalizes a `find` result value.
///
/// The first element of a non-empty string array is cut at its last `-`.
/// Labels without a `-` are returned whole. Every other shape is "Unknown".
pub fn normalize_label(result: Option<&Value>) -> RecognitionResult {
    let first = match result {
        Some(Value::Array(items)) => items.first(),
        _ => None,
    };
    match first {
        Some(Value::String(label)) => {
            let name = label.rsplit_once('-').map_or(label.as_str(), |(name, _)| name);
            RecognitionResult::new(name)
        }
        _ => RecognitionResult::unknown(),
    }
}
