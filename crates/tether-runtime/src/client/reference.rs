use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use tether_core::address::RemoteAddress;
use tether_core::error::{Result, RpcError};

use crate::chain::{Chain, Outcome};
use crate::invocation::RpcInvocation;
use crate::server::MethodDescriptor;

/// Resolved settings a reference stamps onto every call.
#[derive(Debug, Clone)]
pub struct CallSettings {
    pub interface: String,
    pub addresses: Vec<RemoteAddress>,
    pub timeout: Duration,
    pub protocol_version: u8,
    pub serialization: u8,
    pub compression: u8,
    pub load_balancer: String,
}

struct Inner {
    settings: CallSettings,
    chain: Chain,
}

/// Call-through handle for one remote interface.
///
/// Equality, hashing and formatting are answered locally from the handle's
/// identity; clones share that identity.
#[derive(Clone)]
pub struct Reference {
    inner: Arc<Inner>,
}

impl Reference {
    pub fn new(settings: CallSettings, chain: Chain) -> Self {
        Self {
            inner: Arc::new(Inner { settings, chain }),
        }
    }

    pub fn interface(&self) -> &str {
        &self.inner.settings.interface
    }

    /// Invoke `method` remotely and return the raw result value.
    pub async fn invoke(&self, method: &MethodDescriptor, args: Vec<Value>) -> Result<Value> {
        let s = &self.inner.settings;
        let mut inv = RpcInvocation::new(
            s.interface.clone(),
            method.name.clone(),
            method.param_types.clone(),
            args,
        )
        .with_addresses(s.addresses.clone());

        let attrs = &mut inv.attributes;
        attrs.request_id = Some(Uuid::new_v4().to_string());
        attrs.timeout = Some(s.timeout);
        attrs.protocol_version = Some(s.protocol_version);
        attrs.serialization = Some(s.serialization);
        attrs.compression = Some(s.compression);
        attrs.load_balancer = Some(s.load_balancer.clone());

        match self.inner.chain.run(&mut inv).await? {
            Outcome::Value(v) => Ok(v),
            Outcome::Response(resp) if resp.is_success() => Ok(resp.result),
            Outcome::Response(resp) => Err(RpcError::Remote(resp.message.unwrap_or_default())),
        }
    }

    /// Invoke and deserialize the result into `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &MethodDescriptor,
        args: Vec<Value>,
    ) -> Result<T> {
        let v = self.invoke(method, args).await?;
        serde_json::from_value(v)
            .map_err(|e| RpcError::Serialization(format!("result of {method}: {e}")))
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Reference {}

impl Hash for Reference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.inner) as usize).hash(state);
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("interface", &self.inner.settings.interface)
            .field("id", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reference<{}>@{:p}",
            self.inner.settings.interface,
            Arc::as_ptr(&self.inner)
        )
    }
}
