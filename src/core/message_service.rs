// src/core/message_service.rs

//! Names and vends request/response queues, and demultiplexes inbound
//! responses to the `ResponseManager` waiting on them.
//!
//! Owns the process-wide pending-request registry as an explicit struct
//! field (a `DashMap`), constructed with the coordinator and torn down with
//! it - not global mutable state.

use crate::core::dispatch::response_manager::ResponseManager;
use crate::core::errors::CoordError;
use crate::core::message::{Request, RequestId, Response};
use crate::core::primitives::{ClusterLock, ClusterMap, ClusterPrimitives, Queue};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Vends queue/map/lock handles for a database's cluster primitives and
/// demultiplexes inbound responses to their `ResponseManager`.
pub struct MessageService<P: ClusterPrimitives<Request, Response>> {
    primitives: Arc<P>,
    pending: DashMap<RequestId, Arc<ResponseManager>>,
}

impl<P: ClusterPrimitives<Request, Response>> MessageService<P> {
    pub fn new(primitives: Arc<P>) -> Self {
        Self {
            primitives,
            pending: DashMap::new(),
        }
    }

    pub fn local_node(&self) -> &str {
        self.primitives.local_node()
    }

    pub fn is_alive(&self, node: &str) -> bool {
        self.primitives.is_alive(node)
    }

    pub fn request_queue(&self, node: &str, database: &str) -> Arc<dyn Queue<Request>> {
        self.primitives.request_queue(node, database)
    }

    pub fn response_queue(&self, node: &str) -> Arc<dyn Queue<Response>> {
        self.primitives.response_queue(node)
    }

    /// Drops `node`'s request queue for `database`, e.g. once it has left
    /// the partition. Does not touch its response queue or undo map.
    pub fn drop_request_queue(&self, node: &str, database: &str) {
        self.primitives.remove_request_queue(node, database);
    }

    pub fn undo_map(&self, node: &str, database: &str) -> Arc<dyn ClusterMap<String, Request>> {
        self.primitives.undo_map(node, database)
    }

    pub fn lock(&self, database: &str) -> Arc<dyn ClusterLock> {
        self.primitives.lock(database)
    }

    /// Registers a `ResponseManager` for `request_id`. Present from dispatch
    /// until the manager is explicitly unregistered.
    pub fn register(&self, request_id: RequestId, manager: Arc<ResponseManager>) {
        self.pending.insert(request_id, manager);
    }

    pub fn unregister(&self, request_id: RequestId) {
        self.pending.remove(&request_id);
    }

    /// Demultiplexes one inbound response to its pending `ResponseManager`.
    /// A response with no matching pending entry is dropped - the sender has
    /// already timed out or this dispatch never tracked a manager for it
    /// (the no-response execution mode).
    pub fn deliver_response(&self, response: Response) {
        match self.pending.get(&response.request_id) {
            Some(manager) => manager.on_response(response),
            None => debug!(request_id = %response.request_id, "dropping response with no pending request"),
        }
    }

    /// Drains this node's response queue forever, demultiplexing each
    /// arrival, until `shutdown_rx` fires.
    pub async fn run_response_listener(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let queue = self.response_queue(self.local_node());
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    debug!("response listener shutting down");
                    return;
                }
                taken = queue.take() => {
                    match taken {
                        Ok(response) => self.deliver_response(response),
                        Err(err) => {
                            warn!(%err, "response queue closed, stopping listener");
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Surfaces a `Primitive` error with enough context for the dispatcher's
/// `DispatchFailed` to carry a useful message.
pub fn primitive_err(context: &str, err: CoordError) -> CoordError {
    CoordError::DispatchFailed(format!("{context}: {err}"))
}
