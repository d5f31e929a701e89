//! Transport layer (TCP).
//!
//! Each connection is owned by one task that is both the only reader and the
//! only writer. Whole frames are split off by `FrameCodec`; protocol decoding
//! happens once per frame inside the connection loop.

pub mod codec;
pub mod connection;

pub use codec::FrameCodec;
pub use connection::{spawn, ConnectionHandle, InboundHandler};
