//! Service table and the terminal that dispatches into it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use tether_core::error::{Result, RpcError};

use crate::chain::{Outcome, Terminal};
use crate::invocation::RpcInvocation;

/// A method as identified on the wire: name plus ordered parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub name: String,
    pub param_types: Vec<String>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, param_types: &[&str]) -> Self {
        Self {
            name: name.into(),
            param_types: param_types.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn matches(&self, name: &str, param_types: &[String]) -> bool {
        self.name == name && self.param_types == param_types
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.param_types.join(", "))
    }
}

/// A named interface and the methods it exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub methods: Vec<MethodDescriptor>,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn method(mut self, name: impl Into<String>, param_types: &[&str]) -> Self {
        self.methods.push(MethodDescriptor::new(name, param_types));
        self
    }

    pub fn find(&self, name: &str, param_types: &[String]) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.matches(name, param_types))
    }
}

/// Server-side implementation of one interface.
#[async_trait]
pub trait Service: Send + Sync {
    async fn call(&self, method: &MethodDescriptor, args: Vec<Value>) -> Result<Value>;
}

/// Builds a service instance on first use.
pub type ServiceFactory = Arc<dyn Fn() -> Result<Arc<dyn Service>> + Send + Sync>;

struct Slot {
    descriptor: Arc<InterfaceDescriptor>,
    instance: Option<Arc<dyn Service>>,
    factory: Option<ServiceFactory>,
}

/// Declared interfaces and their instances.
#[derive(Default)]
pub struct ServiceTable {
    slots: DashMap<String, Slot>,
}

impl fmt::Debug for ServiceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceTable")
            .field("interfaces", &self.interfaces())
            .finish()
    }
}

impl ServiceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `descriptor` with a ready instance. Replaces any previous
    /// registration of the same interface.
    pub fn export(&self, descriptor: InterfaceDescriptor, instance: Arc<dyn Service>) {
        tracing::info!(interface = %descriptor.name, methods = descriptor.methods.len(), "exported");
        self.slots.insert(
            descriptor.name.clone(),
            Slot {
                descriptor: Arc::new(descriptor),
                instance: Some(instance),
                factory: None,
            },
        );
    }

    /// Declare `descriptor` with a factory run on the first call.
    pub fn declare(&self, descriptor: InterfaceDescriptor, factory: ServiceFactory) {
        tracing::info!(interface = %descriptor.name, "declared (lazy)");
        self.slots.insert(
            descriptor.name.clone(),
            Slot {
                descriptor: Arc::new(descriptor),
                instance: None,
                factory: Some(factory),
            },
        );
    }

    /// Drop the instance but keep the interface declared. Returns `false` if
    /// the interface was never declared.
    pub fn unexport(&self, name: &str) -> bool {
        match self.slots.get_mut(name) {
            Some(mut slot) => {
                slot.instance = None;
                slot.factory = None;
                tracing::info!(interface = name, "unexported");
                true
            }
            None => false,
        }
    }

    pub fn interfaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Resolve target, method and instance, then call the service.
    pub async fn dispatch(
        &self,
        target: &str,
        method: &str,
        param_types: &[String],
        args: Vec<Value>,
    ) -> Result<Value> {
        let (method, service) = self.resolve(target, method, param_types)?;
        match service.call(&method, args).await {
            Ok(v) => Ok(v),
            Err(e @ RpcError::Invocation(_)) => Err(e),
            Err(e) => Err(RpcError::Invocation(e.to_string())),
        }
    }

    fn resolve(
        &self,
        target: &str,
        method: &str,
        param_types: &[String],
    ) -> Result<(MethodDescriptor, Arc<dyn Service>)> {
        // write guard: lazy construction runs at most once per interface
        let mut slot = self
            .slots
            .get_mut(target)
            .ok_or_else(|| RpcError::UnknownTarget(target.to_string()))?;

        let found = slot
            .descriptor
            .find(method, param_types)
            .cloned()
            .ok_or_else(|| RpcError::MethodNotFound {
                target: target.to_string(),
                method: method.to_string(),
                params: param_types.join(", "),
            })?;

        if slot.instance.is_none() {
            if let Some(factory) = slot.factory.clone() {
                tracing::debug!(interface = target, "instantiating service");
                slot.instance = Some(factory()?);
            }
        }

        let service = slot
            .instance
            .clone()
            .ok_or_else(|| RpcError::ServiceNotFound(target.to_string()))?;
        Ok((found, service))
    }
}

/// Chain terminal on the serving side.
pub struct ServiceDispatch {
    table: Arc<ServiceTable>,
}

impl ServiceDispatch {
    pub fn new(table: Arc<ServiceTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl Terminal for ServiceDispatch {
    async fn invoke(&self, inv: &mut RpcInvocation) -> Result<Outcome> {
        let args = std::mem::take(&mut inv.args);
        self.table
            .dispatch(&inv.target, &inv.method, &inv.param_types, args)
            .await
            .map(Outcome::Value)
    }
}
