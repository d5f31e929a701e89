//! Remote endpoint addresses.

use std::fmt;

use serde::Deserialize;

/// How an address is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    /// Concrete `host:port`, used as is.
    #[default]
    Fixed,
    /// Logical service name, resolved through a service discoverer.
    ServiceName,
}

/// A candidate endpoint for a call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteAddress {
    #[serde(default)]
    pub kind: AddressKind,
    pub host: String,
    #[serde(default)]
    pub port: u16,
}

impl RemoteAddress {
    pub fn fixed(host: impl Into<String>, port: u16) -> Self {
        Self {
            kind: AddressKind::Fixed,
            host: host.into(),
            port,
        }
    }

    /// A logical name; the port is ignored.
    pub fn service(name: impl Into<String>) -> Self {
        Self {
            kind: AddressKind::ServiceName,
            host: name.into(),
            port: 0,
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.kind == AddressKind::Fixed
    }

    /// `host:port` for socket connects.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AddressKind::Fixed => write!(f, "{}:{}", self.host, self.port),
            AddressKind::ServiceName => write!(f, "service:{}", self.host),
        }
    }
}

impl From<std::net::SocketAddr> for RemoteAddress {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self::fixed(addr.ip().to_string(), addr.port())
    }
}
