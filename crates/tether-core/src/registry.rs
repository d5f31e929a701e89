//! Component registry: named implementations of each capability.
//!
//! Components are keyed by (capability type, name). Serializers and
//! compressors are additionally indexed by their 1-byte wire id so the frame
//! decoder can resolve them from header bytes. The registry is built once and
//! then shared read-only behind an `Arc`.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::balance::{LoadBalancer, RandomLoadBalancer, RoundRobinLoadBalancer};
use crate::compress::{Compressor, GzipCompressor, NoneCompressor};
use crate::error::{Result, RpcError};
use crate::serialize::{JsonSerializer, Serializer};

const SERIALIZER: &str = "serializer";
const COMPRESSOR: &str = "compressor";
const LOAD_BALANCER: &str = "load balancer";

#[derive(Default)]
pub struct ComponentRegistry {
    // value is always `Arc<C>` for the keyed `TypeId::of::<C>()`
    named: HashMap<(TypeId, String), Box<dyn Any + Send + Sync>>,
    serializers_by_id: HashMap<u8, Arc<dyn Serializer>>,
    compressors_by_id: HashMap<u8, Arc<dyn Compressor>>,
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.named.len())
            .field("serializer_ids", &self.serializers_by_id.keys())
            .field("compressor_ids", &self.compressors_by_id.keys())
            .finish()
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in json serializer, none/gzip compressors and
    /// random/round_robin load balancers.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register_serializer(Arc::new(JsonSerializer));
        reg.register_compressor(Arc::new(NoneCompressor));
        reg.register_compressor(Arc::new(GzipCompressor::default()));
        reg.register_load_balancer(Arc::new(RandomLoadBalancer));
        reg.register_load_balancer(Arc::new(RoundRobinLoadBalancer::default()));
        reg
    }

    /// Register any component under `(C, name)`. A later registration with
    /// the same key replaces the earlier one.
    pub fn register<C>(&mut self, name: impl Into<String>, component: Arc<C>)
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.named
            .insert((TypeId::of::<C>(), name.into()), Box::new(component));
    }

    /// Look up a component by capability and name.
    pub fn get<C>(&self, name: &str) -> Option<Arc<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.named
            .get(&(TypeId::of::<C>(), name.to_string()))
            .and_then(|b| b.downcast_ref::<Arc<C>>())
            .cloned()
    }

    pub fn register_serializer(&mut self, s: Arc<dyn Serializer>) {
        self.serializers_by_id.insert(s.id(), s.clone());
        self.register::<dyn Serializer>(s.name(), s);
    }

    pub fn register_compressor(&mut self, c: Arc<dyn Compressor>) {
        self.compressors_by_id.insert(c.id(), c.clone());
        self.register::<dyn Compressor>(c.name(), c);
    }

    pub fn register_load_balancer(&mut self, lb: Arc<dyn LoadBalancer>) {
        self.register::<dyn LoadBalancer>(lb.name(), lb);
    }

    pub fn serializer(&self, name: &str) -> Result<Arc<dyn Serializer>> {
        self.get::<dyn Serializer>(name)
            .ok_or_else(|| unknown(SERIALIZER, name))
    }

    pub fn compressor(&self, name: &str) -> Result<Arc<dyn Compressor>> {
        self.get::<dyn Compressor>(name)
            .ok_or_else(|| unknown(COMPRESSOR, name))
    }

    pub fn load_balancer(&self, name: &str) -> Result<Arc<dyn LoadBalancer>> {
        self.get::<dyn LoadBalancer>(name)
            .ok_or_else(|| unknown(LOAD_BALANCER, name))
    }

    pub fn serializer_by_id(&self, id: u8) -> Result<Arc<dyn Serializer>> {
        self.serializers_by_id
            .get(&id)
            .cloned()
            .ok_or(RpcError::UnknownComponentId {
                capability: SERIALIZER,
                id,
            })
    }

    pub fn compressor_by_id(&self, id: u8) -> Result<Arc<dyn Compressor>> {
        self.compressors_by_id
            .get(&id)
            .cloned()
            .ok_or(RpcError::UnknownComponentId {
                capability: COMPRESSOR,
                id,
            })
    }
}

fn unknown(capability: &'static str, name: &str) -> RpcError {
    RpcError::UnknownComponent {
        capability,
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    trait Greeting: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct Hi;
    impl Greeting for Hi {
        fn greet(&self) -> &'static str {
            "hi"
        }
    }

    #[test]
    fn defaults_resolve_by_name_and_id() {
        let reg = ComponentRegistry::with_defaults();
        assert_eq!(reg.serializer("json").unwrap().id(), 0x01);
        assert_eq!(reg.compressor("gzip").unwrap().id(), 0x02);
        assert_eq!(reg.compressor_by_id(0x01).unwrap().name(), "none");
        assert_eq!(reg.load_balancer("round_robin").unwrap().name(), "round_robin");
    }

    #[test]
    fn unknown_lookups_fail() {
        let reg = ComponentRegistry::with_defaults();
        assert!(matches!(
            reg.serializer("xml"),
            Err(RpcError::UnknownComponent { capability: "serializer", .. })
        ));
        assert!(matches!(
            reg.serializer_by_id(0x7f),
            Err(RpcError::UnknownComponentId { id: 0x7f, .. })
        ));
    }

    #[test]
    fn same_name_different_capability_does_not_collide() {
        let mut reg = ComponentRegistry::with_defaults();
        reg.register::<dyn Greeting>("json", Arc::new(Hi));
        assert_eq!(reg.get::<dyn Greeting>("json").unwrap().greet(), "hi");
        assert_eq!(reg.serializer("json").unwrap().name(), "json");
        assert!(reg.get::<dyn Greeting>("gzip").is_none());
    }
}
