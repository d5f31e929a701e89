//! Length-prefixed frame splitter for `tokio_util::codec`.
//!
//! - Waits until the fixed header and length field are buffered
//! - Rejects lengths below the header size or above the limit before
//!   reserving any payload space
//! - Yields whole frames (header included) for `protocol::decode`

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use tether_core::error::{Result, RpcError};
use tether_core::protocol::{peek_frame_length, MAX_FRAME_LENGTH, MIN_FRAME_LEN};

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame: usize,
}

impl FrameCodec {
    pub fn new(max_frame: usize) -> Self {
        Self {
            max_frame: max_frame.clamp(MIN_FRAME_LEN, MAX_FRAME_LENGTH),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_LENGTH)
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = RpcError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>> {
        let Some(len) = peek_frame_length(src) else {
            return Ok(None);
        };
        if len < MIN_FRAME_LEN {
            return Err(RpcError::Malformed(format!(
                "length field {len} shorter than header"
            )));
        }
        if len > self.max_frame {
            return Err(RpcError::FrameTooLarge {
                len,
                max: self.max_frame,
            });
        }
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }
        Ok(Some(src.split_to(len)))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = RpcError;

    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> Result<()> {
        if frame.len() > self.max_frame {
            return Err(RpcError::FrameTooLarge {
                len: frame.len(),
                max: self.max_frame,
            });
        }
        dst.extend_from_slice(&frame);
        Ok(())
    }
}
