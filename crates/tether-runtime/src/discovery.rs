//! Service discovery: logical service name to concrete addresses.

use async_trait::async_trait;
use dashmap::DashMap;

use tether_core::address::RemoteAddress;
use tether_core::error::Result;

#[async_trait]
pub trait ServiceDiscoverer: Send + Sync {
    /// Concrete addresses currently registered under `service`. Unknown names
    /// resolve to an empty list.
    async fn resolve(&self, service: &str) -> Result<Vec<RemoteAddress>>;
    async fn register(&self, service: &str, addr: RemoteAddress) -> Result<()>;
    async fn unregister(&self, service: &str, addr: &RemoteAddress) -> Result<()>;
}

/// In-process discoverer, useful when every node shares one process or for
/// tests.
#[derive(Debug, Default)]
pub struct LocalServiceDiscoverer {
    services: DashMap<String, Vec<RemoteAddress>>,
}

impl LocalServiceDiscoverer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceDiscoverer for LocalServiceDiscoverer {
    async fn resolve(&self, service: &str) -> Result<Vec<RemoteAddress>> {
        Ok(self
            .services
            .get(service)
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }

    async fn register(&self, service: &str, addr: RemoteAddress) -> Result<()> {
        let mut entry = self.services.entry(service.to_string()).or_default();
        if !entry.contains(&addr) {
            tracing::debug!(service, %addr, "registered address");
            entry.push(addr);
        }
        Ok(())
    }

    async fn unregister(&self, service: &str, addr: &RemoteAddress) -> Result<()> {
        let now_empty = match self.services.get_mut(service) {
            Some(mut entry) => {
                entry.retain(|a| a != addr);
                entry.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.services.remove_if(service, |_, v| v.is_empty());
        }
        tracing::debug!(service, %addr, "unregistered address");
        Ok(())
    }
}
