//! Built-in services.

pub mod echo;

pub use echo::EchoService;
