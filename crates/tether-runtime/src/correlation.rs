//! Request correlation: in-flight request id to a one-shot completion.
//!
//! Completion and timeout both resolve an entry by removing it from the map,
//! so exactly one of them wins and a late response is discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::time::Instant;

use tether_core::error::{Result, RpcError};
use tether_core::protocol::Response;

struct Slot {
    // distinguishes a reused id from the registration a handle owns
    seq: u64,
    tx: oneshot::Sender<Result<Response>>,
}

/// Thread-safe registry of outstanding calls. Cheap to clone.
#[derive(Clone, Default)]
pub struct PendingRequests {
    slots: Arc<DashMap<String, Slot>>,
    seq: Arc<AtomicU64>,
}

impl std::fmt::Debug for PendingRequests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequests")
            .field("in_flight", &self.slots.len())
            .finish()
    }
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `id` until it completes or `timeout` elapses.
    pub fn register(&self, id: &str, timeout: Duration) -> Result<ResponseHandle> {
        let deadline = Instant::now().checked_add(timeout).ok_or_else(|| {
            RpcError::Config(format!("timeout {timeout:?} for request {id} is out of range"))
        })?;
        let (tx, rx) = oneshot::channel();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        match self.slots.entry(id.to_string()) {
            Entry::Occupied(_) => return Err(RpcError::DuplicateRequest(id.to_string())),
            Entry::Vacant(v) => {
                v.insert(Slot { seq, tx });
            }
        }
        Ok(ResponseHandle {
            slots: self.slots.clone(),
            id: id.to_string(),
            seq,
            rx: Some(rx),
            timeout,
            deadline,
        })
    }

    /// Deliver the result for `id`. Returns `false` when the entry already
    /// resolved (timed out, completed, or abandoned).
    pub fn complete(&self, id: &str, result: Result<Response>) -> bool {
        match self.slots.remove(id) {
            Some((_, slot)) => slot.tx.send(result).is_ok(),
            None => {
                tracing::debug!(request_id = id, "no pending request; discarding completion");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }
}

/// The waiting side of one registration.
pub struct ResponseHandle {
    slots: Arc<DashMap<String, Slot>>,
    id: String,
    seq: u64,
    rx: Option<oneshot::Receiver<Result<Response>>>,
    timeout: Duration,
    deadline: Instant,
}

impl std::fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseHandle")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ResponseHandle {
    pub fn request_id(&self) -> &str {
        &self.id
    }

    /// Wait for the completion or the deadline, whichever resolves the entry.
    pub async fn wait(mut self) -> Result<Response> {
        let Some(mut rx) = self.rx.take() else {
            return Err(RpcError::Internal("response handle already consumed".into()));
        };

        match rx.try_recv() {
            Ok(res) => return res,
            Err(oneshot::error::TryRecvError::Closed) => return Err(RpcError::ChannelClosed),
            Err(oneshot::error::TryRecvError::Empty) => {}
        }

        match tokio::time::timeout_at(self.deadline, &mut rx).await {
            Ok(Ok(res)) => res,
            Ok(Err(_)) => Err(RpcError::ChannelClosed),
            Err(_) => {
                if self.remove_own() {
                    tracing::debug!(request_id = %self.id, timeout_ms = self.timeout.as_millis() as u64, "request timed out");
                    return Err(RpcError::Timeout {
                        request_id: self.id.clone(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    });
                }
                // a completion removed the entry first; its value is on the way
                rx.await.unwrap_or(Err(RpcError::ChannelClosed))
            }
        }
    }

    fn remove_own(&self) -> bool {
        self.slots
            .remove_if(&self.id, |_, slot| slot.seq == self.seq)
            .is_some()
    }
}

impl Drop for ResponseHandle {
    fn drop(&mut self) {
        self.remove_own();
    }
}
