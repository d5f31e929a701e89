//! Payload serializers.

use crate::error::{Result, RpcError};
use crate::protocol::{MessageKind, Payload, Request, Response};

/// Turns payloads into bytes and back.
///
/// Implementations are registered in the `ComponentRegistry` under a logical
/// name and a 1-byte wire id.
pub trait Serializer: Send + Sync {
    /// Wire id written into the frame header.
    fn id(&self) -> u8;
    /// Logical name used by configuration.
    fn name(&self) -> &'static str;
    fn serialize(&self, payload: &Payload) -> Result<Vec<u8>>;
    fn deserialize(&self, bytes: &[u8], kind: MessageKind) -> Result<Payload>;
}

/// JSON bodies via `serde_json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub const ID: u8 = 0x01;
    pub const NAME: &'static str = "json";
}

impl Serializer for JsonSerializer {
    fn id(&self) -> u8 {
        Self::ID
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn serialize(&self, payload: &Payload) -> Result<Vec<u8>> {
        let out = match payload {
            Payload::Request(r) => serde_json::to_vec(r),
            Payload::Response(r) => serde_json::to_vec(r),
        };
        out.map_err(|e| RpcError::Serialization(format!("json encode failed: {e}")))
    }

    fn deserialize(&self, bytes: &[u8], kind: MessageKind) -> Result<Payload> {
        match kind {
            MessageKind::Request => serde_json::from_slice::<Request>(bytes).map(Payload::Request),
            MessageKind::Response => {
                serde_json::from_slice::<Response>(bytes).map(Payload::Response)
            }
        }
        .map_err(|e| RpcError::Serialization(format!("invalid {kind:?} json: {e}")))
    }
}
