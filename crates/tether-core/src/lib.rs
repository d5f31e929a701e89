//! tether core: wire protocol, message types, pluggable codecs and the
//! component registry.
//!
//! This crate defines the frame layout and error surface shared by the client
//! and server halves of the runtime. It carries no socket or async runtime
//! dependencies so the codec can be exercised directly over byte buffers.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed frames surface as `RpcError` and never bring a connection task
//! down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod address;
pub mod balance;
pub mod compress;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod serialize;

/// Shared result type.
pub use error::{ErrorClass, Result, RpcError};
pub use registry::ComponentRegistry;
