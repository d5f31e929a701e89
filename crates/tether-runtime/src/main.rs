//! tether node
//!
//! - Loads `tether.yaml` (or the path in `TETHER_CONFIG`)
//! - Exports the built-in echo service
//! - Serves until Ctrl-C

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use tether_core::error::{Result, RpcError};
use tether_runtime::{config, services::EchoService, Node};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::var("TETHER_CONFIG").unwrap_or_else(|_| "tether.yaml".into());
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.node.listen_addr()?;

    let node = Node::from_config(&cfg.node)?;
    node.export(EchoService::descriptor(), Arc::new(EchoService))
        .await?;
    for r in &cfg.references {
        // fail fast on component names the registry does not know
        node.refer(r)?;
    }

    let server = node.serve(listen).await?;
    tracing::info!(listen = %server.local_addr(), references = cfg.references.len(), "tether-node started");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| RpcError::Internal(format!("signal handler failed: {e}")))?;
    server.shutdown()
}
