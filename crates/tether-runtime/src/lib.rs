//! tether runtime library entry.
//!
//! This crate wires correlation, the invocation chain, the client and server
//! paths and the TCP transport into a node. It is consumed by the binary
//! (`main.rs`) and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod chain;
pub mod client;
pub mod config;
pub mod correlation;
pub mod discovery;
pub mod invocation;
pub mod node;
pub mod server;
pub mod services;
pub mod transport;

pub use client::Reference;
pub use node::Node;
pub use server::Server;
