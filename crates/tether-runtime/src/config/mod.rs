//! Node config loader (strict parsing).

pub mod schema;

use std::fs;

use tether_core::error::{Result, RpcError};

pub use schema::{NodeSection, ReferenceConfig, TetherConfig, TimeoutUnit};

pub fn load_from_file(path: &str) -> Result<TetherConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| RpcError::Config(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<TetherConfig> {
    let cfg: TetherConfig =
        serde_yaml::from_str(s).map_err(|e| RpcError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
