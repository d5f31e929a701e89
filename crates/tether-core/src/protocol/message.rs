//! Envelope, request and response bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::header::{MessageKind, ProtocolVersion, ResponseStatus};

/// A remote call as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    /// Caller-generated id, unique among in-flight calls.
    pub request_id: String,
    /// Fully-qualified interface name.
    pub target: String,
    pub method: String,
    /// Ordered parameter type descriptors.
    #[serde(default)]
    pub param_types: Vec<String>,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// The result of a remote call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Response {
    pub request_id: String,
    #[serde(default)]
    pub result: Value,
    pub status: ResponseStatus,
    #[serde(default)]
    pub message: Option<String>,
}

impl Response {
    pub fn success(request_id: impl Into<String>, result: Value) -> Self {
        Self {
            request_id: request_id.into(),
            result,
            status: ResponseStatus::Success,
            message: Some("ok".into()),
        }
    }

    pub fn fail(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            result: Value::Null,
            status: ResponseStatus::Fail,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// Decoded frame body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Request(Request),
    Response(Response),
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::Request(_) => MessageKind::Request,
            Payload::Response(_) => MessageKind::Response,
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            Payload::Request(r) => &r.request_id,
            Payload::Response(r) => &r.request_id,
        }
    }
}

/// A typed frame: header fields plus the decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub version: u8,
    pub kind: MessageKind,
    pub serialization: u8,
    pub compression: u8,
    pub status: ResponseStatus,
    pub payload: Payload,
}

impl Envelope {
    /// Request envelope with the given codec ids.
    pub fn request(version: u8, serialization: u8, compression: u8, request: Request) -> Self {
        Self {
            version,
            kind: MessageKind::Request,
            serialization,
            compression,
            status: ResponseStatus::Success,
            payload: Payload::Request(request),
        }
    }

    /// Response envelope; the header status mirrors the response body.
    pub fn response(version: u8, serialization: u8, compression: u8, response: Response) -> Self {
        Self {
            version,
            kind: MessageKind::Response,
            serialization,
            compression,
            status: response.status,
            payload: Payload::Response(response),
        }
    }

    /// Request envelope using the current protocol version.
    pub fn current_request(serialization: u8, compression: u8, request: Request) -> Self {
        Self::request(ProtocolVersion::CURRENT.code(), serialization, compression, request)
    }
}
