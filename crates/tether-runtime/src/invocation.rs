//! Per-call invocation context and its attributes.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use tether_core::address::RemoteAddress;
use tether_core::balance::CallTarget;
use tether_core::error::{Result, RpcError};
use tether_core::protocol::Request;

/// Shape of an extension attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn matches(self, v: &Value) -> bool {
        match self {
            ValueKind::Bool => v.is_boolean(),
            ValueKind::Number => v.is_number(),
            ValueKind::String => v.is_string(),
            ValueKind::Array => v.is_array(),
            ValueKind::Object => v.is_object(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

/// Attribute names a stage can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKey {
    RequestId,
    Timeout,
    RemoteAddress,
    ProtocolVersion,
    Serialization,
    Compression,
    LoadBalancer,
    /// Consumer metadata stored in `Attributes::extensions`.
    Extension {
        name: &'static str,
        kind: ValueKind,
    },
}

impl AttrKey {
    pub fn name(self) -> &'static str {
        match self {
            AttrKey::RequestId => "request_id",
            AttrKey::Timeout => "timeout",
            AttrKey::RemoteAddress => "remote_address",
            AttrKey::ProtocolVersion => "protocol_version",
            AttrKey::Serialization => "serialization",
            AttrKey::Compression => "compression",
            AttrKey::LoadBalancer => "load_balancer",
            AttrKey::Extension { name, .. } => name,
        }
    }

    pub fn expected(self) -> &'static str {
        match self {
            AttrKey::RequestId => "string",
            AttrKey::Timeout => "duration",
            AttrKey::RemoteAddress => "address",
            AttrKey::ProtocolVersion | AttrKey::Serialization | AttrKey::Compression => "u8",
            AttrKey::LoadBalancer => "string",
            AttrKey::Extension { kind, .. } => kind.as_str(),
        }
    }
}

/// A declared dependency of a stage on one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub attr: AttrKey,
    pub required: bool,
}

impl Requirement {
    pub const fn required(attr: AttrKey) -> Self {
        Self {
            attr,
            required: true,
        }
    }

    pub const fn optional(attr: AttrKey) -> Self {
        Self {
            attr,
            required: false,
        }
    }
}

/// Well-known call attributes plus open extensions.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    pub request_id: Option<String>,
    pub timeout: Option<Duration>,
    pub remote_address: Option<RemoteAddress>,
    pub protocol_version: Option<u8>,
    pub serialization: Option<u8>,
    pub compression: Option<u8>,
    pub load_balancer: Option<String>,
    pub extensions: HashMap<String, Value>,
}

impl Attributes {
    /// Check one requirement. Well-known fields are typed, so only presence
    /// is checked for them; extensions must also match their value kind.
    pub fn check(&self, req: &Requirement) -> Result<()> {
        let present = match req.attr {
            AttrKey::RequestId => self.request_id.is_some(),
            AttrKey::Timeout => self.timeout.is_some(),
            AttrKey::RemoteAddress => self.remote_address.is_some(),
            AttrKey::ProtocolVersion => self.protocol_version.is_some(),
            AttrKey::Serialization => self.serialization.is_some(),
            AttrKey::Compression => self.compression.is_some(),
            AttrKey::LoadBalancer => self.load_balancer.is_some(),
            AttrKey::Extension { name, kind } => match self.extensions.get(name) {
                Some(v) if kind.matches(v) => true,
                Some(_) => return Err(missing(req.attr)),
                None => false,
            },
        };
        if req.required && !present {
            return Err(missing(req.attr));
        }
        Ok(())
    }

    pub fn check_all(&self, reqs: &[Requirement]) -> Result<()> {
        reqs.iter().try_for_each(|r| self.check(r))
    }

    pub fn request_id(&self) -> Result<&str> {
        self.request_id
            .as_deref()
            .ok_or_else(|| missing(AttrKey::RequestId))
    }

    pub fn timeout(&self) -> Result<Duration> {
        self.timeout.ok_or_else(|| missing(AttrKey::Timeout))
    }

    pub fn remote_address(&self) -> Result<&RemoteAddress> {
        self.remote_address
            .as_ref()
            .ok_or_else(|| missing(AttrKey::RemoteAddress))
    }

    pub fn protocol_version(&self) -> Result<u8> {
        self.protocol_version
            .ok_or_else(|| missing(AttrKey::ProtocolVersion))
    }

    pub fn serialization(&self) -> Result<u8> {
        self.serialization
            .ok_or_else(|| missing(AttrKey::Serialization))
    }

    pub fn compression(&self) -> Result<u8> {
        self.compression.ok_or_else(|| missing(AttrKey::Compression))
    }

    pub fn load_balancer(&self) -> Result<&str> {
        self.load_balancer
            .as_deref()
            .ok_or_else(|| missing(AttrKey::LoadBalancer))
    }
}

fn missing(attr: AttrKey) -> RpcError {
    RpcError::MissingAttribute {
        name: attr.name().to_string(),
        expected: attr.expected(),
    }
}

/// One call attempt as it flows through a chain.
#[derive(Debug, Clone, Default)]
pub struct RpcInvocation {
    /// Candidate endpoints; empty on the serving side.
    pub addresses: Vec<RemoteAddress>,
    pub target: String,
    pub method: String,
    pub param_types: Vec<String>,
    pub args: Vec<Value>,
    pub attributes: Attributes,
}

impl RpcInvocation {
    pub fn new(
        target: impl Into<String>,
        method: impl Into<String>,
        param_types: Vec<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            addresses: Vec::new(),
            target: target.into(),
            method: method.into(),
            param_types,
            args,
            attributes: Attributes::default(),
        }
    }

    pub fn with_addresses(mut self, addresses: Vec<RemoteAddress>) -> Self {
        self.addresses = addresses;
        self
    }

    /// Server-side context for a decoded request.
    pub fn from_request(req: Request) -> Self {
        let mut inv = Self::new(req.target, req.method, req.param_types, req.args);
        inv.attributes.request_id = Some(req.request_id);
        inv
    }

    pub fn call_target(&self) -> CallTarget {
        CallTarget::new(&self.target, &self.method)
    }

    /// Wire request for this call.
    pub fn to_request(&self) -> Result<Request> {
        Ok(Request {
            request_id: self.attributes.request_id()?.to_string(),
            target: self.target.clone(),
            method: self.method.clone(),
            param_types: self.param_types.clone(),
            args: self.args.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const TENANT: AttrKey = AttrKey::Extension {
        name: "tenant",
        kind: ValueKind::String,
    };

    #[test]
    fn required_extension_must_be_present_and_typed() {
        let mut attrs = Attributes::default();
        let req = Requirement::required(TENANT);
        assert!(matches!(
            attrs.check(&req),
            Err(RpcError::MissingAttribute { ref name, expected: "string" }) if name == "tenant"
        ));

        attrs.extensions.insert("tenant".into(), Value::from(7));
        assert!(attrs.check(&req).is_err());

        attrs.extensions.insert("tenant".into(), Value::from("acme"));
        attrs.check(&req).unwrap();
    }

    #[test]
    fn optional_requirement_tolerates_absence() {
        let attrs = Attributes::default();
        attrs
            .check_all(&[Requirement::optional(AttrKey::Timeout), Requirement::optional(TENANT)])
            .unwrap();
    }
}
