use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use tether_core::error::{Result, RpcError};
use tether_core::protocol::{Envelope, Payload};
use tether_core::ComponentRegistry;

use crate::chain::{Outcome, Terminal};
use crate::correlation::PendingRequests;
use crate::invocation::{AttrKey, Requirement, RpcInvocation};
use crate::transport::{self, ConnectionHandle, InboundHandler};

/// Completes pending calls from response frames.
pub struct ResponseRouter {
    pending: PendingRequests,
}

impl ResponseRouter {
    pub fn new(pending: PendingRequests) -> Self {
        Self { pending }
    }
}

#[async_trait]
impl InboundHandler for ResponseRouter {
    async fn on_envelope(&self, env: Envelope, conn: &ConnectionHandle) {
        match env.payload {
            Payload::Response(resp) => {
                let id = resp.request_id.clone();
                if !self.pending.complete(&id, Ok(resp)) {
                    tracing::debug!(peer = %conn.peer(), request_id = %id, "late or unknown response discarded");
                }
            }
            Payload::Request(req) => {
                tracing::debug!(peer = %conn.peer(), request_id = %req.request_id, "client ignoring request frame");
            }
        }
    }
}

/// Client terminal: connect, register, write, await the correlated response.
pub struct TcpRequestTerminal {
    registry: Arc<ComponentRegistry>,
    pending: PendingRequests,
    max_frame: usize,
}

impl TcpRequestTerminal {
    const REQUIRES: [Requirement; 6] = [
        Requirement::required(AttrKey::RequestId),
        Requirement::required(AttrKey::Timeout),
        Requirement::required(AttrKey::RemoteAddress),
        Requirement::required(AttrKey::ProtocolVersion),
        Requirement::required(AttrKey::Serialization),
        Requirement::required(AttrKey::Compression),
    ];

    pub fn new(registry: Arc<ComponentRegistry>, pending: PendingRequests, max_frame: usize) -> Self {
        Self {
            registry,
            pending,
            max_frame,
        }
    }
}

#[async_trait]
impl Terminal for TcpRequestTerminal {
    fn requirements(&self) -> &[Requirement] {
        &Self::REQUIRES
    }

    async fn invoke(&self, inv: &mut RpcInvocation) -> Result<Outcome> {
        let attrs = &inv.attributes;
        let addr = attrs.remote_address()?.clone();
        let request = inv.to_request()?;
        let envelope = Envelope::request(
            attrs.protocol_version()?,
            attrs.serialization()?,
            attrs.compression()?,
            request,
        );
        let id = envelope.payload.request_id().to_string();

        let stream = TcpStream::connect(addr.authority())
            .await
            .map_err(|e| RpcError::Connect {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        let conn = transport::spawn(
            stream,
            self.registry.clone(),
            Arc::new(ResponseRouter::new(self.pending.clone())),
            self.max_frame,
            CancellationToken::new(),
        )?;

        // registered before the write so a fast response always finds its entry
        let handle = match self.pending.register(&id, attrs.timeout()?) {
            Ok(h) => h,
            Err(e) => {
                conn.close();
                return Err(e);
            }
        };

        tracing::debug!(request_id = %id, %addr, interface = %inv.target, method = %inv.method, "sending request");
        if let Err(e) = conn.send(envelope).await {
            self.pending.complete(&id, Err(RpcError::Write(e.to_string())));
        }

        let result = handle.wait().await;
        conn.close();
        result.map(Outcome::Response)
    }
}
