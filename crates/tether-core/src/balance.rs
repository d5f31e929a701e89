//! Load balancers pick one address out of a candidate list.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

use crate::address::RemoteAddress;
use crate::error::{Result, RpcError};

/// What is being called; passed to balancers that route by target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    pub target: String,
    pub method: String,
}

impl CallTarget {
    pub fn new(target: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
        }
    }
}

/// Chooses one address per call.
pub trait LoadBalancer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pick from `candidates`. An empty list is `NoAvailableAddress`.
    fn select(&self, candidates: &[RemoteAddress], call: &CallTarget) -> Result<RemoteAddress>;
}

fn no_address(call: &CallTarget) -> RpcError {
    RpcError::NoAvailableAddress(call.target.clone())
}

/// Uniform random choice.
#[derive(Debug, Default)]
pub struct RandomLoadBalancer;

impl RandomLoadBalancer {
    pub const NAME: &'static str = "random";
}

impl LoadBalancer for RandomLoadBalancer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn select(&self, candidates: &[RemoteAddress], call: &CallTarget) -> Result<RemoteAddress> {
        if candidates.is_empty() {
            return Err(no_address(call));
        }
        let idx = rand::thread_rng().gen_range(0..candidates.len());
        candidates
            .get(idx)
            .cloned()
            .ok_or_else(|| no_address(call))
    }
}

/// Cycles through the candidates, shared across all targets.
#[derive(Debug, Default)]
pub struct RoundRobinLoadBalancer {
    next: AtomicUsize,
}

impl RoundRobinLoadBalancer {
    pub const NAME: &'static str = "round_robin";
}

impl LoadBalancer for RoundRobinLoadBalancer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn select(&self, candidates: &[RemoteAddress], call: &CallTarget) -> Result<RemoteAddress> {
        if candidates.is_empty() {
            return Err(no_address(call));
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % candidates.len();
        candidates
            .get(idx)
            .cloned()
            .ok_or_else(|| no_address(call))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn addrs() -> Vec<RemoteAddress> {
        vec![
            RemoteAddress::fixed("10.0.0.1", 7000),
            RemoteAddress::fixed("10.0.0.2", 7000),
            RemoteAddress::fixed("10.0.0.3", 7000),
        ]
    }

    #[test]
    fn round_robin_cycles() {
        let lb = RoundRobinLoadBalancer::default();
        let call = CallTarget::new("demo.Greeter", "hello");
        let list = addrs();
        let picked: Vec<_> = (0..4).map(|_| lb.select(&list, &call).unwrap()).collect();
        assert_eq!(picked[0], list[0]);
        assert_eq!(picked[1], list[1]);
        assert_eq!(picked[2], list[2]);
        assert_eq!(picked[3], list[0]);
    }

    #[test]
    fn random_stays_in_range() {
        let lb = RandomLoadBalancer;
        let call = CallTarget::new("demo.Greeter", "hello");
        let list = addrs();
        for _ in 0..32 {
            assert!(list.contains(&lb.select(&list, &call).unwrap()));
        }
    }

    #[test]
    fn empty_list_is_no_available_address() {
        let call = CallTarget::new("demo.Greeter", "hello");
        let err = RandomLoadBalancer.select(&[], &call).unwrap_err();
        assert!(matches!(err, RpcError::NoAvailableAddress(t) if t == "demo.Greeter"));
        let err = RoundRobinLoadBalancer::default()
            .select(&[], &call)
            .unwrap_err();
        assert!(matches!(err, RpcError::NoAvailableAddress(_)));
    }
}
