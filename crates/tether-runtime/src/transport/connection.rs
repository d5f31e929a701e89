//! Connection task: one reader/writer loop per TCP stream.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use tether_core::error::{Result, RpcError};
use tether_core::protocol::{self, Envelope};
use tether_core::ComponentRegistry;

use super::codec::FrameCodec;

const OUTBOUND_CAPACITY: usize = 256;

/// Receives every envelope decoded on a connection.
#[async_trait]
pub trait InboundHandler: Send + Sync + 'static {
    async fn on_envelope(&self, env: Envelope, conn: &ConnectionHandle);
}

struct Outbound {
    envelope: Envelope,
    ack: oneshot::Sender<Result<()>>,
}

/// Sending side of a connection task. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<Outbound>,
    peer: SocketAddr,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ConnectionHandle {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queue an envelope and wait until it has been written to the socket.
    pub async fn send(&self, envelope: Envelope) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Outbound { envelope, ack })
            .await
            .map_err(|_| RpcError::ChannelClosed)?;
        done.await.map_err(|_| RpcError::ChannelClosed)?
    }

    /// Stop the connection task; queued writes are abandoned.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

/// Start the task that owns `stream`. The task ends when the peer closes,
/// a framing error occurs, or `cancel` fires.
pub fn spawn(
    stream: TcpStream,
    registry: Arc<ComponentRegistry>,
    handler: Arc<dyn InboundHandler>,
    max_frame: usize,
    cancel: CancellationToken,
) -> Result<ConnectionHandle> {
    let peer = stream.peer_addr()?;
    let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let handle = ConnectionHandle { tx, peer, cancel };
    tokio::spawn(run(stream, rx, handle.clone(), registry, handler, max_frame));
    Ok(handle)
}

async fn run(
    stream: TcpStream,
    mut rx: mpsc::Receiver<Outbound>,
    handle: ConnectionHandle,
    registry: Arc<ComponentRegistry>,
    handler: Arc<dyn InboundHandler>,
    max_frame: usize,
) {
    let peer = handle.peer;
    let (rd, wr) = stream.into_split();
    let mut reader = FramedRead::new(rd, FrameCodec::new(max_frame));
    let mut writer = FramedWrite::new(wr, FrameCodec::new(max_frame));

    tracing::debug!(%peer, "connection open");

    loop {
        tokio::select! {
            _ = handle.cancel.cancelled() => break,

            // outbound writer
            maybe_out = rx.recv() => {
                let Some(Outbound { envelope, ack }) = maybe_out else { break; };
                let res = match protocol::encode(&envelope, &registry) {
                    Ok(frame) => writer.send(frame).await,
                    Err(e) => Err(e),
                };
                let broken = matches!(res, Err(RpcError::Io(_)));
                if let Err(e) = &res {
                    tracing::warn!(%peer, request_id = envelope.payload.request_id(), error = %e, "write failed");
                }
                let _ = ack.send(res);
                if broken {
                    break;
                }
            }

            // inbound reader
            incoming = reader.next() => {
                let frame = match incoming {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        tracing::warn!(%peer, error = %e, "framing error; closing connection");
                        break;
                    }
                    None => break,
                };
                match protocol::decode(frame.freeze(), &registry) {
                    Ok(env) => handler.on_envelope(env, &handle).await,
                    Err(e) => {
                        tracing::warn!(%peer, error = %e, class = e.class().as_str(), "dropping undecodable frame");
                    }
                }
            }
        }
    }

    rx.close();
    tracing::debug!(%peer, "connection closed");
}
