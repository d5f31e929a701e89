//! Wire protocol: header constants, message types and the frame codec.
//!
//! Frame layout (network byte order):
//!
//! ```text
//! +-------+---------+-----+------+------+--------+--------+---------+
//! | magic | version | ser | comp | kind | status | length | payload |
//! |  5B   |   1B    | 1B  |  1B  |  1B  |   1B   |   4B   |   var   |
//! +-------+---------+-----+------+------+--------+--------+---------+
//! ```
//!
//! `length` is the total frame length, header included. Payloads are
//! serialized first and compressed second.
//!
//! All parsers are panic-free: malformed input is reported as `RpcError`
//! instead of panicking or indexing raw buffers.

pub mod frame;
pub mod header;
pub mod message;

pub use frame::{decode, encode, peek_frame_length};
pub use header::{
    MessageKind, ProtocolVersion, ResponseStatus, HEADER_LEN, MAGIC, MAX_FRAME_LENGTH,
    MIN_FRAME_LEN,
};
pub use message::{Envelope, Payload, Request, Response};
