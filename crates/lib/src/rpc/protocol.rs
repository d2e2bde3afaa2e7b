//! zerorpc event encoding for the recognition service.
//!
//! Every message is a single ZeroMQ frame holding a msgpack array
//! `[header, name, args]`. A call is the event `find` carrying the image path
//! as its only argument. The service answers with `OK` and `[result]`, or with
//! `ERR` and `[error_name, message, traceback]`. Events named `_zpc_hb` are
//! heartbeats and carry no answer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// zerorpc protocol version sent in every header.
pub const PROTOCOL_VERSION: u32 = 3;
/// The only remote procedure the gateway calls.
pub const FIND_METHOD: &str = "find";
pub const REPLY_OK: &str = "OK";
pub const REPLY_ERR: &str = "ERR";
pub const HEARTBEAT: &str = "_zpc_hb";
/// Largest event the client will decode. Anything bigger is discarded.
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventHeader {
    pub message_id: String,
    pub v: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_to: Option<String>,
}

/// One zerorpc event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub header: EventHeader,
    pub name: String,
    pub args: Vec<Value>,
}

impl Event {
    fn new(
        message_id: impl Into<String>,
        response_to: Option<&str>,
        name: &str,
        args: Vec<Value>,
    ) -> Self {
        Self {
            header: EventHeader {
                message_id: message_id.into(),
                v: PROTOCOL_VERSION,
                response_to: response_to.map(str::to_string),
            },
            name: name.to_string(),
            args,
        }
    }

    /// Builds a `find(path)` call.
    pub fn find(message_id: impl Into<String>, path: &str) -> Self {
        Self::new(
            message_id,
            None,
            FIND_METHOD,
            vec![Value::String(path.to_string())],
        )
    }

    /// Builds a successful answer to `request`.
    pub fn ok(request: &Event, message_id: impl Into<String>, result: Value) -> Self {
        Self::new(
            message_id,
            Some(&request.header.message_id),
            REPLY_OK,
            vec![result],
        )
    }

    /// Builds an error answer to `request`.
    pub fn err(request: &Event, message_id: impl Into<String>, name: &str, message: &str) -> Self {
        Self::new(
            message_id,
            Some(&request.header.message_id),
            REPLY_ERR,
            vec![
                Value::String(name.to_string()),
                Value::String(message.to_string()),
                Value::String(String::new()),
            ],
        )
    }

    /// Builds a heartbeat on the channel opened by `request`.
    pub fn heartbeat(request: &Event, message_id: impl Into<String>) -> Self {
        Self::new(
            message_id,
            Some(&request.header.message_id),
            HEARTBEAT,
            Vec::new(),
        )
    }

    pub fn is_heartbeat(&self) -> bool {
        self.name == HEARTBEAT
    }

    /// Encodes the event as msgpack, with the header as a map.
    pub fn encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(&(&self.header, &self.name, &self.args))
    }

    /// Decodes one frame. Returns `None` for oversized or malformed events.
    pub fn decode(frame: &[u8]) -> Option<Self> {
        if frame.len() > MAX_EVENT_BYTES {
            return None;
        }
        let (header, name, args): (EventHeader, String, Vec<Value>) =
            rmp_serde::from_slice(frame).ok()?;
        Some(Self { header, name, args })
    }
}
