//! Payload compressors.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Result, RpcError};
use crate::protocol::MAX_FRAME_LENGTH;

/// Compresses serialized payload bytes.
pub trait Compressor: Send + Sync {
    /// Wire id written into the frame header.
    fn id(&self) -> u8;
    /// Logical name used by configuration.
    fn name(&self) -> &'static str;
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>>;
    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>>;
}

/// Identity compressor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneCompressor;

impl NoneCompressor {
    pub const ID: u8 = 0x01;
    pub const NAME: &'static str = "none";
}

impl Compressor for NoneCompressor {
    fn id(&self) -> u8 {
        Self::ID
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// Gzip via `flate2`. Decompressed output is capped at `MAX_FRAME_LENGTH`.
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: u32,
}

impl GzipCompressor {
    pub const ID: u8 = 0x02;
    pub const NAME: &'static str = "gzip";

    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new(6)
    }
}

impl Compressor for GzipCompressor {
    fn id(&self) -> u8 {
        Self::ID
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::new(self.level));
        enc.write_all(bytes)
            .and_then(|_| enc.finish())
            .map_err(|e| RpcError::Compression(format!("gzip compress failed: {e}")))
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let limit = MAX_FRAME_LENGTH as u64;
        GzDecoder::new(bytes)
            .take(limit + 1)
            .read_to_end(&mut out)
            .map_err(|e| RpcError::Compression(format!("gzip decompress failed: {e}")))?;
        if out.len() as u64 > limit {
            return Err(RpcError::FrameTooLarge {
                len: out.len(),
                max: MAX_FRAME_LENGTH,
            });
        }
        Ok(out)
    }
}
