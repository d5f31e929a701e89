//! Top-level facade crate for tether.
//!
//! Re-exports the wire/core types and the runtime (node, client, server) so
//! users can depend on a single crate.

pub mod core {
    pub use tether_core::*;
}

pub mod runtime {
    pub use tether_runtime::*;
}

pub use tether_core::{ComponentRegistry, Result, RpcError};
pub use tether_runtime::{Node, Reference, Server};
