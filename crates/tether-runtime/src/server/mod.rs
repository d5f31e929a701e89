//! Server dispatch path: accept loop, request handling, response framing.

pub mod dispatch;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use tether_core::error::{Result, RpcError};
use tether_core::protocol::{Envelope, Payload, Request, Response};
use tether_core::{ComponentRegistry, ErrorClass};

use crate::chain::{Chain, Outcome, ResponseFraming, Stage};
use crate::invocation::RpcInvocation;
use crate::transport::{self, ConnectionHandle, InboundHandler};

pub use dispatch::{
    InterfaceDescriptor, MethodDescriptor, Service, ServiceDispatch, ServiceFactory, ServiceTable,
};

/// The serving-side chain: response framing around service dispatch, with
/// `extra` stages sorted in by their order.
pub fn server_chain(table: Arc<ServiceTable>, extra: &[Arc<dyn Stage>]) -> Chain {
    let builder = Chain::builder(Arc::new(ServiceDispatch::new(table)))
        .stage(Arc::new(ResponseFraming));
    extra
        .iter()
        .fold(builder, |b, stage| b.stage(stage.clone()))
        .build()
}

/// Routes inbound request frames into the server chain.
pub struct RequestHandler {
    chain: Arc<Chain>,
}

impl RequestHandler {
    pub fn new(chain: Arc<Chain>) -> Self {
        Self { chain }
    }

    /// Run one request through the chain and build the response envelope.
    pub async fn handle(&self, header: &Envelope, req: Request) -> Envelope {
        let mut inv = RpcInvocation::from_request(req);
        inv.attributes.protocol_version = Some(header.version);
        inv.attributes.serialization = Some(header.serialization);
        inv.attributes.compression = Some(header.compression);

        let request_id = inv.attributes.request_id.clone().unwrap_or_default();
        let resp = match self.chain.run(&mut inv).await {
            Ok(Outcome::Response(resp)) => resp,
            Ok(Outcome::Value(v)) => Response::success(request_id, v),
            Err(e) => Response::fail(request_id, e.to_string()),
        };
        Envelope::response(header.version, header.serialization, header.compression, resp)
    }
}

#[async_trait]
impl InboundHandler for RequestHandler {
    async fn on_envelope(&self, env: Envelope, conn: &ConnectionHandle) {
        let req = match &env.payload {
            Payload::Request(req) => req.clone(),
            Payload::Response(resp) => {
                tracing::debug!(peer = %conn.peer(), request_id = %resp.request_id, "server ignoring response frame");
                return;
            }
        };

        let chain = self.chain.clone();
        let conn = conn.clone();
        tokio::spawn(async move {
            let request_id = req.request_id.clone();
            tracing::debug!(peer = %conn.peer(), %request_id, interface = %req.target, method = %req.method, "request");
            let out = RequestHandler::new(chain).handle(&env, req).await;
            match conn.send(out).await {
                Ok(()) => {}
                // the frame could not be built but the connection is fine
                Err(e) if e.class() == ErrorClass::Protocol => {
                    tracing::warn!(peer = %conn.peer(), %request_id, error = %e, "response not encodable; sending failure");
                    let fail = Envelope::response(
                        env.version,
                        env.serialization,
                        env.compression,
                        Response::fail(request_id.as_str(), e.to_string()),
                    );
                    if let Err(e) = conn.send(fail).await {
                        tracing::warn!(peer = %conn.peer(), %request_id, error = %e, "failure response dropped");
                    }
                }
                Err(e) => {
                    tracing::warn!(peer = %conn.peer(), %request_id, error = %e, "response dropped; connection not writable");
                }
            }
        });
    }
}

/// A running listener. Dropping it stops accepting and closes connections.
#[derive(Debug)]
pub struct Server {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    stopped: AtomicBool,
}

impl Server {
    /// Bind `addr` and start the accept loop.
    pub async fn bind(
        addr: SocketAddr,
        registry: Arc<ComponentRegistry>,
        handler: Arc<dyn InboundHandler>,
        max_frame: usize,
    ) -> Result<Server> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let cancel = CancellationToken::new();

        tracing::info!(%local_addr, "server listening");
        tokio::spawn(accept_loop(
            listener,
            registry,
            handler,
            max_frame,
            cancel.clone(),
        ));

        Ok(Server {
            local_addr,
            cancel,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and close every connection. A second call is an error.
    pub fn shutdown(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Err(RpcError::Internal("server already stopped".into()));
        }
        tracing::info!(local_addr = %self.local_addr, "server shutting down");
        self.cancel.cancel();
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<ComponentRegistry>,
    handler: Arc<dyn InboundHandler>,
    max_frame: usize,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "accepted");
                    if let Err(e) = transport::spawn(
                        stream,
                        registry.clone(),
                        handler.clone(),
                        max_frame,
                        cancel.child_token(),
                    ) {
                        tracing::warn!(%peer, error = %e, "failed to start connection");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            },
        }
    }
}
