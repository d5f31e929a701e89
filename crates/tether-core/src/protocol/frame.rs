//! Frame encode/decode (panic-free).
//!
//! Parsing rules:
//! - Never index (`buf[0]`); read through `Buf` after `remaining()` checks.
//! - Magic is verified before any other field is read.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, RpcError};
use crate::registry::ComponentRegistry;

use super::header::{
    MessageKind, ProtocolVersion, ResponseStatus, HEADER_LEN, MAGIC, MAX_FRAME_LENGTH,
    MIN_FRAME_LEN,
};
use super::message::Envelope;

/// Encode an envelope into one complete frame.
pub fn encode(env: &Envelope, registry: &ComponentRegistry) -> Result<Bytes> {
    if env.kind != env.payload.kind() {
        return Err(RpcError::Malformed(format!(
            "header kind {:?} does not match payload kind {:?}",
            env.kind,
            env.payload.kind()
        )));
    }
    ProtocolVersion::from_code(env.version)?;

    let serializer = registry.serializer_by_id(env.serialization)?;
    let compressor = registry.compressor_by_id(env.compression)?;

    let body = serializer.serialize(&env.payload)?;
    let body = compressor.compress(&body)?;

    let total = MIN_FRAME_LEN + body.len();
    if total > MAX_FRAME_LENGTH {
        return Err(RpcError::FrameTooLarge {
            len: total,
            max: MAX_FRAME_LENGTH,
        });
    }

    let mut out = BytesMut::with_capacity(total);
    out.put_slice(&MAGIC);
    out.put_u8(env.version);
    out.put_u8(env.serialization);
    out.put_u8(env.compression);
    out.put_u8(env.kind.code());
    out.put_u8(env.status.code());
    out.put_u32(total as u32);
    out.put_slice(&body);
    Ok(out.freeze())
}

/// Decode one complete frame (as split off by the transport framer).
pub fn decode(mut buf: Bytes, registry: &ComponentRegistry) -> Result<Envelope> {
    let total = buf.remaining();
    if total < MAGIC.len() {
        return Err(RpcError::Malformed(format!(
            "frame too short for magic: {total} bytes"
        )));
    }

    let mut magic = [0u8; 5];
    buf.copy_to_slice(&mut magic);
    if magic != MAGIC {
        return Err(RpcError::BadMagic {
            expected: MAGIC,
            found: magic,
        });
    }

    if total < MIN_FRAME_LEN {
        return Err(RpcError::Malformed(format!(
            "frame too short for header: {total} bytes"
        )));
    }

    let version = buf.get_u8();
    ProtocolVersion::from_code(version)?;

    let serialization = buf.get_u8();
    let compression = buf.get_u8();
    let kind = buf.get_u8();
    let status = buf.get_u8();
    let declared = buf.get_u32() as usize;

    if declared > MAX_FRAME_LENGTH {
        return Err(RpcError::FrameTooLarge {
            len: declared,
            max: MAX_FRAME_LENGTH,
        });
    }
    if declared != total {
        return Err(RpcError::Malformed(format!(
            "length field says {declared} bytes, frame has {total}"
        )));
    }

    let serializer = registry.serializer_by_id(serialization)?;
    let compressor = registry.compressor_by_id(compression)?;
    let kind = MessageKind::from_code(kind)?;
    let status = ResponseStatus::from_code(status)?;

    let raw = compressor.decompress(buf.chunk())?;
    let payload = serializer.deserialize(&raw, kind)?;
    tracing::trace!(?kind, len = total, request_id = payload.request_id(), "decoded frame");

    Ok(Envelope {
        version,
        kind,
        serialization,
        compression,
        status,
        payload,
    })
}

/// Total frame length announced by a buffered header, if the header is
/// complete.
pub fn peek_frame_length(buf: &[u8]) -> Option<usize> {
    let mut field = buf.get(HEADER_LEN..MIN_FRAME_LEN)?;
    Some(field.get_u32() as usize)
}
