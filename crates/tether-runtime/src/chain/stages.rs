//! Built-in chain stages.

use std::sync::Arc;

use async_trait::async_trait;

use tether_core::error::{Result, RpcError};
use tether_core::protocol::Response;
use tether_core::ComponentRegistry;

use crate::discovery::ServiceDiscoverer;
use crate::invocation::{AttrKey, Requirement, RpcInvocation};

use super::{Outcome, Stage};

/// Resolves candidate addresses and picks one with the configured balancer.
pub struct LoadBalanceStage {
    registry: Arc<ComponentRegistry>,
    discoverer: Option<Arc<dyn ServiceDiscoverer>>,
}

impl LoadBalanceStage {
    pub const ORDER: i32 = 0;

    const REQUIRES: [Requirement; 1] = [Requirement::required(AttrKey::LoadBalancer)];

    pub fn new(
        registry: Arc<ComponentRegistry>,
        discoverer: Option<Arc<dyn ServiceDiscoverer>>,
    ) -> Self {
        Self {
            registry,
            discoverer,
        }
    }
}

#[async_trait]
impl Stage for LoadBalanceStage {
    fn name(&self) -> &'static str {
        "load_balance"
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn requirements(&self) -> &[Requirement] {
        &Self::REQUIRES
    }

    async fn before(&self, inv: &mut RpcInvocation) -> Result<()> {
        let mut candidates = Vec::with_capacity(inv.addresses.len());
        for addr in &inv.addresses {
            if addr.is_fixed() {
                candidates.push(addr.clone());
                continue;
            }
            match &self.discoverer {
                Some(d) => candidates.extend(d.resolve(&addr.host).await?),
                None => {
                    tracing::debug!(service = %addr.host, "no discoverer; skipping service-name address")
                }
            }
        }
        if candidates.is_empty() {
            return Err(RpcError::NoAvailableAddress(inv.target.clone()));
        }

        let balancer = self.registry.load_balancer(inv.attributes.load_balancer()?)?;
        let chosen = balancer.select(&candidates, &inv.call_target())?;
        tracing::debug!(interface = %inv.target, addr = %chosen, balancer = balancer.name(), "selected address");
        inv.attributes.remote_address = Some(chosen);
        Ok(())
    }
}

/// Fails the call unless every listed attribute is present.
pub struct RequireAttributes {
    requirements: Vec<Requirement>,
}

impl RequireAttributes {
    pub const ORDER: i32 = 100;

    pub fn new(requirements: Vec<Requirement>) -> Self {
        Self { requirements }
    }

    /// Everything the TCP request terminal needs to build and send a frame.
    pub fn transport() -> Self {
        Self::new(vec![
            Requirement::required(AttrKey::RequestId),
            Requirement::required(AttrKey::Timeout),
            Requirement::required(AttrKey::RemoteAddress),
            Requirement::required(AttrKey::ProtocolVersion),
            Requirement::required(AttrKey::Serialization),
            Requirement::required(AttrKey::Compression),
        ])
    }
}

#[async_trait]
impl Stage for RequireAttributes {
    fn name(&self) -> &'static str {
        "require_attributes"
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }
}

/// Unwraps a response outcome into its result value.
#[derive(Debug, Default)]
pub struct ResultCoercion;

impl ResultCoercion {
    pub const ORDER: i32 = -100;
}

#[async_trait]
impl Stage for ResultCoercion {
    fn name(&self) -> &'static str {
        "result_coercion"
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    async fn after(&self, _inv: &mut RpcInvocation, outcome: Outcome) -> Result<Outcome> {
        match outcome {
            Outcome::Response(resp) if resp.is_success() => Ok(Outcome::Value(resp.result)),
            Outcome::Response(resp) => Err(RpcError::Remote(
                resp.message.unwrap_or_else(|| "remote call failed".into()),
            )),
            value => Ok(value),
        }
    }
}

/// Server side: turns any completion into a response for the caller.
#[derive(Debug, Default)]
pub struct ResponseFraming;

impl ResponseFraming {
    pub const ORDER: i32 = -100;

    const REQUIRES: [Requirement; 4] = [
        Requirement::required(AttrKey::RequestId),
        Requirement::required(AttrKey::ProtocolVersion),
        Requirement::required(AttrKey::Serialization),
        Requirement::required(AttrKey::Compression),
    ];
}

#[async_trait]
impl Stage for ResponseFraming {
    fn name(&self) -> &'static str {
        "response_framing"
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn requirements(&self) -> &[Requirement] {
        &Self::REQUIRES
    }

    async fn after_completion(
        &self,
        inv: &RpcInvocation,
        result: Result<Outcome>,
    ) -> Result<Outcome> {
        let id = inv.attributes.request_id()?;
        let resp = match result {
            Ok(Outcome::Response(resp)) => resp,
            Ok(Outcome::Value(v)) => Response::success(id, v),
            Err(e) => {
                tracing::debug!(request_id = id, interface = %inv.target, method = %inv.method, error = %e, "call failed");
                Response::fail(id, e.to_string())
            }
        };
        Ok(Outcome::Response(resp))
    }
}
