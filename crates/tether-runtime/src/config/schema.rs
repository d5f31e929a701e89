use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use tether_core::address::{AddressKind, RemoteAddress};
use tether_core::error::{Result, RpcError};
use tether_core::protocol::{ProtocolVersion, MAX_FRAME_LENGTH, MIN_FRAME_LEN};

/// Upper bound for a per-call timeout (one day).
pub const MAX_CALL_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TetherConfig {
    pub version: u32,

    #[serde(default)]
    pub node: NodeSection,

    #[serde(default)]
    pub references: Vec<ReferenceConfig>,
}

impl TetherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RpcError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.node.validate()?;

        let mut seen = HashSet::new();
        for r in &self.references {
            r.validate()?;
            if !seen.insert(r.interface.as_str()) {
                return Err(RpcError::Config(format!(
                    "duplicate reference for interface `{}`",
                    r.interface
                )));
            }
        }
        Ok(())
    }

    pub fn reference(&self, interface: &str) -> Option<&ReferenceConfig> {
        self.references.iter().find(|r| r.interface == interface)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Address published to the discoverer for exported services.
    #[serde(default)]
    pub advertise: Option<String>,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            advertise: None,
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl NodeSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if let Some(adv) = &self.advertise {
            adv.parse::<SocketAddr>().map_err(|e| {
                RpcError::Config(format!("node.advertise must be host:port ({adv}): {e}"))
            })?;
        }
        if !(MIN_FRAME_LEN..=MAX_FRAME_LENGTH).contains(&self.max_frame_bytes) {
            return Err(RpcError::Config(format!(
                "node.max_frame_bytes must be between {MIN_FRAME_LEN} and {MAX_FRAME_LENGTH}"
            )));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            RpcError::Config(format!(
                "node.listen must be a valid SocketAddr ({}): {e}",
                self.listen
            ))
        })
    }

    pub fn advertise_addr(&self) -> Result<Option<RemoteAddress>> {
        self.advertise
            .as_deref()
            .map(|a| {
                a.parse::<SocketAddr>()
                    .map(RemoteAddress::from)
                    .map_err(|e| RpcError::Config(format!("node.advertise: {e}")))
            })
            .transpose()
    }
}

fn default_listen() -> String {
    "0.0.0.0:7420".into()
}
fn default_max_frame_bytes() -> usize {
    MAX_FRAME_LENGTH
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutUnit {
    #[default]
    Millis,
    Seconds,
}

/// Per-interface client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceConfig {
    pub interface: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub timeout_unit: TimeoutUnit,

    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,

    #[serde(default = "default_serializer")]
    pub serializer: String,

    #[serde(default = "default_compressor")]
    pub compressor: String,

    #[serde(default = "default_load_balancer")]
    pub load_balancer: String,

    pub addresses: Vec<RemoteAddress>,
}

impl ReferenceConfig {
    /// Defaults for everything but the interface and its addresses.
    pub fn new(interface: impl Into<String>, addresses: Vec<RemoteAddress>) -> Self {
        Self {
            interface: interface.into(),
            timeout: default_timeout(),
            timeout_unit: TimeoutUnit::Millis,
            protocol_version: default_protocol_version(),
            serializer: default_serializer(),
            compressor: default_compressor(),
            load_balancer: default_load_balancer(),
            addresses,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.interface.trim().is_empty() {
            return Err(RpcError::Config("references[].interface must not be empty".into()));
        }
        if self.timeout == 0 {
            return Err(RpcError::Config(format!(
                "references[{}].timeout must be positive",
                self.interface
            )));
        }
        if self.timeout_duration() > MAX_CALL_TIMEOUT {
            return Err(RpcError::Config(format!(
                "references[{}].timeout must not exceed {}s",
                self.interface,
                MAX_CALL_TIMEOUT.as_secs()
            )));
        }
        ProtocolVersion::from_name(&self.protocol_version)?;
        if self.addresses.is_empty() {
            return Err(RpcError::Config(format!(
                "references[{}].addresses must not be empty",
                self.interface
            )));
        }
        for a in &self.addresses {
            if a.host.is_empty() {
                return Err(RpcError::Config(format!(
                    "references[{}]: address host must not be empty",
                    self.interface
                )));
            }
            if a.kind == AddressKind::Fixed && a.port == 0 {
                return Err(RpcError::Config(format!(
                    "references[{}]: fixed address {} needs a port",
                    self.interface, a.host
                )));
            }
        }
        Ok(())
    }

    pub fn timeout_duration(&self) -> Duration {
        match self.timeout_unit {
            TimeoutUnit::Millis => Duration::from_millis(self.timeout),
            TimeoutUnit::Seconds => Duration::from_secs(self.timeout),
        }
    }
}

fn default_timeout() -> u64 {
    3000
}
fn default_protocol_version() -> String {
    "V1".into()
}
fn default_serializer() -> String {
    "json".into()
}
fn default_compressor() -> String {
    "none".into()
}
fn default_load_balancer() -> String {
    "random".into()
}
