//! Header constants and 1-byte code tables.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RpcError};

/// Protocol magic (`rpc4j`).
pub const MAGIC: [u8; 5] = *b"rpc4j";

/// Fixed header fields before the length: magic, version, serialization,
/// compression, kind, status.
pub const HEADER_LEN: usize = 5 + 1 + 1 + 1 + 1 + 1;

/// Size of the length field.
pub const LENGTH_FIELD_LEN: usize = 4;

/// Smallest possible frame (empty payload).
pub const MIN_FRAME_LEN: usize = HEADER_LEN + LENGTH_FIELD_LEN;

/// Upper bound for a whole frame (10 MiB).
pub const MAX_FRAME_LENGTH: usize = 10 * 1024 * 1024;

/// Supported protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    V1,
}

impl ProtocolVersion {
    pub const CURRENT: ProtocolVersion = ProtocolVersion::V1;

    pub fn code(self) -> u8 {
        match self {
            ProtocolVersion::V1 => 0x01,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x01 => Ok(ProtocolVersion::V1),
            other => Err(RpcError::UnsupportedVersion(other)),
        }
    }

    /// Parse the config spelling (`"V1"`, case-insensitive).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "V1" => Ok(ProtocolVersion::V1),
            _ => Err(RpcError::Config(format!("unknown protocol version: {name}"))),
        }
    }
}

/// Message kind byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Request,
    Response,
}

impl MessageKind {
    pub fn code(self) -> u8 {
        match self {
            MessageKind::Request => 0x01,
            MessageKind::Response => 0x02,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x01 => Ok(MessageKind::Request),
            0x02 => Ok(MessageKind::Response),
            other => Err(RpcError::UnknownMessageKind(other)),
        }
    }
}

/// Response status. Request frames always carry `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Fail,
}

impl ResponseStatus {
    pub fn code(self) -> u8 {
        match self {
            ResponseStatus::Success => 0x01,
            ResponseStatus::Fail => 0x02,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x01 => Ok(ResponseStatus::Success),
            0x02 => Ok(ResponseStatus::Fail),
            other => Err(RpcError::UnknownStatus(other)),
        }
    }
}
