//! Node: the registration and reference entry point.
//!
//! A node owns the component registry, the correlation registry, the service
//! table and an optional discoverer. `export` publishes a service (and the
//! node's advertised address), `refer` hands out client references, `serve`
//! starts the listener.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tether_core::address::RemoteAddress;
use tether_core::error::{Result, RpcError};
use tether_core::protocol::{ProtocolVersion, MAX_FRAME_LENGTH};
use tether_core::ComponentRegistry;

use crate::chain::Stage;
use crate::client::{client_chain, CallSettings, Reference};
use crate::config::{NodeSection, ReferenceConfig};
use crate::correlation::PendingRequests;
use crate::discovery::ServiceDiscoverer;
use crate::server::{
    server_chain, InterfaceDescriptor, RequestHandler, Server, Service, ServiceFactory,
    ServiceTable,
};

pub struct Node {
    registry: Arc<ComponentRegistry>,
    pending: PendingRequests,
    services: Arc<ServiceTable>,
    discoverer: Option<Arc<dyn ServiceDiscoverer>>,
    advertise: Option<RemoteAddress>,
    max_frame: usize,
    client_stages: Vec<Arc<dyn Stage>>,
    server_stages: Vec<Arc<dyn Stage>>,
    serving: AtomicBool,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("services", &self.services)
            .field("pending", &self.pending)
            .field("advertise", &self.advertise)
            .field("client_stages", &stage_names(&self.client_stages))
            .field("server_stages", &stage_names(&self.server_stages))
            .finish()
    }
}

impl Node {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self {
            registry,
            pending: PendingRequests::new(),
            services: Arc::new(ServiceTable::new()),
            discoverer: None,
            advertise: None,
            max_frame: MAX_FRAME_LENGTH,
            client_stages: Vec::new(),
            server_stages: Vec::new(),
            serving: AtomicBool::new(false),
        }
    }

    /// Node with the built-in components and settings from `node:`.
    pub fn from_config(section: &NodeSection) -> Result<Self> {
        section.validate()?;
        let mut node = Self::new(Arc::new(ComponentRegistry::with_defaults()))
            .with_max_frame_bytes(section.max_frame_bytes);
        node.advertise = section.advertise_addr()?;
        Ok(node)
    }

    pub fn with_discoverer(mut self, discoverer: Arc<dyn ServiceDiscoverer>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }

    pub fn with_advertise(mut self, addr: RemoteAddress) -> Self {
        self.advertise = Some(addr);
        self
    }

    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame = max;
        self
    }

    /// Add a stage to the client chain of every reference this node creates.
    pub fn with_client_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.client_stages.push(stage);
        self
    }

    /// Add a stage to the serving chain.
    pub fn with_server_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.server_stages.push(stage);
        self
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    pub fn services(&self) -> &Arc<ServiceTable> {
        &self.services
    }

    /// Serve `instance` under `descriptor` and publish the advertised address.
    pub async fn export(
        &self,
        descriptor: InterfaceDescriptor,
        instance: Arc<dyn Service>,
    ) -> Result<()> {
        let name = descriptor.name.clone();
        self.services.export(descriptor, instance);
        self.publish(&name).await
    }

    /// Like `export`, but the instance is built on the first call.
    pub async fn declare(
        &self,
        descriptor: InterfaceDescriptor,
        factory: ServiceFactory,
    ) -> Result<()> {
        let name = descriptor.name.clone();
        self.services.declare(descriptor, factory);
        self.publish(&name).await
    }

    /// Stop serving `interface`; later calls fail with "service not found".
    pub async fn unexport(&self, interface: &str) -> Result<()> {
        if !self.services.unexport(interface) {
            return Err(RpcError::UnknownTarget(interface.to_string()));
        }
        if let (Some(d), Some(addr)) = (&self.discoverer, &self.advertise) {
            d.unregister(interface, addr).await?;
        }
        Ok(())
    }

    async fn publish(&self, interface: &str) -> Result<()> {
        if let (Some(d), Some(addr)) = (&self.discoverer, &self.advertise) {
            d.register(interface, addr.clone()).await?;
        }
        Ok(())
    }

    /// Build a client reference from per-interface settings.
    pub fn refer(&self, cfg: &ReferenceConfig) -> Result<Reference> {
        cfg.validate()?;
        let settings = CallSettings {
            interface: cfg.interface.clone(),
            addresses: cfg.addresses.clone(),
            timeout: cfg.timeout_duration(),
            protocol_version: ProtocolVersion::from_name(&cfg.protocol_version)?.code(),
            serialization: self.registry.serializer(&cfg.serializer)?.id(),
            compression: self.registry.compressor(&cfg.compressor)?.id(),
            load_balancer: self.registry.load_balancer(&cfg.load_balancer)?.name().to_string(),
        };
        let chain = client_chain(
            self.registry.clone(),
            self.pending.clone(),
            self.discoverer.clone(),
            self.max_frame,
            &self.client_stages,
        );
        tracing::debug!(interface = %cfg.interface, addresses = cfg.addresses.len(), "reference created");
        Ok(Reference::new(settings, chain))
    }

    /// Bind `addr` and serve every exported interface. A node serves at most
    /// once.
    pub async fn serve(&self, addr: SocketAddr) -> Result<Server> {
        if self.serving.swap(true, Ordering::AcqRel) {
            return Err(RpcError::Internal("node is already serving".into()));
        }
        let handler = Arc::new(RequestHandler::new(Arc::new(server_chain(
            self.services.clone(),
            &self.server_stages,
        ))));
        match Server::bind(addr, self.registry.clone(), handler, self.max_frame).await {
            Ok(server) => Ok(server),
            Err(e) => {
                self.serving.store(false, Ordering::Release);
                Err(e)
            }
        }
    }
}

fn stage_names(stages: &[Arc<dyn Stage>]) -> Vec<&'static str> {
    stages.iter().map(|s| s.name()).collect()
}
