//! Client invocation path.
//!
//! A `Reference` stamps per-call attributes onto a fresh invocation and runs
//! it through `[ResultCoercion, LoadBalanceStage, RequireAttributes]` ending
//! in `TcpRequestTerminal`. Extra stages are sorted in by their order.

pub mod reference;
pub mod terminal;

use std::sync::Arc;

use tether_core::ComponentRegistry;

use crate::chain::{Chain, LoadBalanceStage, RequireAttributes, ResultCoercion, Stage};
use crate::correlation::PendingRequests;
use crate::discovery::ServiceDiscoverer;

pub use reference::{CallSettings, Reference};
pub use terminal::{ResponseRouter, TcpRequestTerminal};

pub fn client_chain(
    registry: Arc<ComponentRegistry>,
    pending: PendingRequests,
    discoverer: Option<Arc<dyn ServiceDiscoverer>>,
    max_frame: usize,
    extra: &[Arc<dyn Stage>],
) -> Chain {
    let terminal = TcpRequestTerminal::new(registry.clone(), pending, max_frame);
    let builder = Chain::builder(Arc::new(terminal))
        .stage(Arc::new(RequireAttributes::transport()))
        .stage(Arc::new(LoadBalanceStage::new(registry, discoverer)))
        .stage(Arc::new(ResultCoercion));
    extra
        .iter()
        .fold(builder, |b, stage| b.stage(stage.clone()))
        .build()
}
