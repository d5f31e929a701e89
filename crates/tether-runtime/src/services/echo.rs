use async_trait::async_trait;
use serde_json::Value;

use tether_core::error::{Result, RpcError};

use crate::server::{InterfaceDescriptor, MethodDescriptor, Service};

/// Echo arguments back to the caller. Useful to prove routing end to end.
#[derive(Debug, Default)]
pub struct EchoService;

impl EchoService {
    pub const INTERFACE: &'static str = "tether.Echo";

    pub fn descriptor() -> InterfaceDescriptor {
        InterfaceDescriptor::new(Self::INTERFACE)
            .method("echo", &["string"])
            .method("ping", &[])
    }
}

#[async_trait]
impl Service for EchoService {
    async fn call(&self, method: &MethodDescriptor, args: Vec<Value>) -> Result<Value> {
        match method.name.as_str() {
            "echo" => args
                .into_iter()
                .next()
                .ok_or_else(|| RpcError::Invocation("echo expects one argument".into())),
            "ping" => Ok(Value::from("pong")),
            other => Err(RpcError::Invocation(format!("echo has no method {other}"))),
        }
    }
}
