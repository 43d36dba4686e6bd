// src/core/recovery/coordinator.rs

//! Recovery coordinator (§4.4): startup crash recovery, periodic anti-entropy
//! resync, and reaction to membership churn.

use crate::core::database::LocalDatabase;
use crate::core::dispatch::OutboundDispatcher;
use crate::core::errors::CoordError;
use crate::core::executor::InboundExecutor;
use crate::core::message::{Request, RequestId};
use crate::core::message_service::MessageService;
use crate::core::metrics::RESYNC_TOTAL;
use crate::core::partition::{PartitionDirectory, PartitionTable};
use crate::core::primitives::ClusterPrimitives;
use crate::core::task::{ExecutionMode, ExecutionOrigin, Payload, QuorumType, ResultStrategy, Task, TaskKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Anti-entropy task dispatched on every resync tick. A no-op application
/// that exists to round-trip quorum acknowledgement, not to mutate state.
#[derive(Debug)]
pub struct ResyncTask;

impl Task for ResyncTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Resync
    }

    fn quorum_type(&self) -> QuorumType {
        QuorumType::Write
    }

    fn result_strategy(&self) -> ResultStrategy {
        ResultStrategy::Any
    }

    fn requires_node_online(&self) -> bool {
        false
    }

    fn execute(
        &self,
        _db: &dyn LocalDatabase,
        _origin: ExecutionOrigin,
        _sender: &str,
    ) -> Result<Payload, CoordError> {
        Ok(Payload::Bool(true))
    }
}

/// Fire-and-forget broadcast of a serialized partition-config snapshot,
/// issued whenever membership changes. Every target node just needs to
/// observe that a new config exists; none of this dispatch's responses are
/// awaited.
#[derive(Debug)]
pub struct ConfigBroadcastTask {
    snapshot: Payload,
}

impl Task for ConfigBroadcastTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Priming
    }

    fn quorum_type(&self) -> QuorumType {
        QuorumType::None
    }

    fn result_strategy(&self) -> ResultStrategy {
        ResultStrategy::Any
    }

    fn requires_node_online(&self) -> bool {
        false
    }

    fn execute(
        &self,
        _db: &dyn LocalDatabase,
        _origin: ExecutionOrigin,
        _sender: &str,
    ) -> Result<Payload, CoordError> {
        Ok(self.snapshot.clone())
    }
}

/// Runs startup/crash recovery, periodic resync, and membership-churn
/// reactions for one (node, database) pair.
pub struct RecoveryCoordinator<P: ClusterPrimitives<Request, crate::core::message::Response>> {
    node: String,
    database: String,
    partitions: Arc<PartitionTable>,
    dispatcher: Arc<OutboundDispatcher<P>>,
    messages: Arc<MessageService<P>>,
}

impl<P: ClusterPrimitives<Request, crate::core::message::Response>> RecoveryCoordinator<P> {
    pub fn new(
        node: impl Into<String>,
        database: impl Into<String>,
        partitions: Arc<PartitionTable>,
        dispatcher: Arc<OutboundDispatcher<P>>,
        messages: Arc<MessageService<P>>,
    ) -> Self {
        Self {
            node: node.into(),
            database: database.into(),
            partitions,
            dispatcher,
            messages,
        }
    }

    /// Startup sequence: replay the last in-flight message from the undo
    /// record, optionally drain already-queued requests, then bring the
    /// executor online.
    pub async fn configure_database(
        &self,
        executor: &InboundExecutor<P>,
        restore_messages: bool,
        unqueue_pending: bool,
    ) {
        if restore_messages && executor.replay_undo_record().await {
            info!(database = %self.database, "replayed undo record on startup");
        }
        if unqueue_pending {
            let drained = executor.drain_pending(Duration::from_millis(50)).await;
            if drained > 0 {
                debug!(database = %self.database, drained, "drained pending requests before going online");
            }
        }
        executor.state().set_online();
    }

    /// Periodic anti-entropy: fires a `ResyncTask` every `resync_every`. A
    /// zero interval disables resync entirely.
    pub async fn run_resync_loop(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let resync_every = self.partitions.resync_every();
        if resync_every.is_zero() {
            return;
        }
        let mut interval = tokio::time::interval(resync_every);
        interval.tick().await; // first tick fires immediately; skip it
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    debug!(database = %self.database, "resync loop shutting down");
                    return;
                }
                _ = interval.tick() => {
                    self.resync_once().await;
                }
            }
        }
    }

    async fn resync_once(&self) {
        let request = Request {
            id: RequestId::new(),
            sender: self.node.clone(),
            database: self.database.clone(),
            cluster: None,
            task: Arc::new(ResyncTask),
            mode: ExecutionMode::Response,
        };
        match self.dispatcher.send(request).await {
            Ok(_) => {
                RESYNC_TOTAL.with_label_values(&[&self.database, "ok"]).inc();
            }
            Err(err) => {
                // Best-effort anti-entropy: swallow and retry next tick.
                warn!(database = %self.database, %err, "resync failed, will retry next tick");
                RESYNC_TOTAL
                    .with_label_values(&[&self.database, "swallowed"])
                    .inc();
            }
        }
    }

    /// Startup membership check: adds the local node to any partition config
    /// that's missing it, then serializes and broadcasts the updated config.
    pub async fn check_local_in_configuration(&self) {
        let touched = self.partitions.check_local_in_configuration(&self.node);
        if !touched.is_empty() {
            info!(node = %self.node, databases = ?touched, "added local node to partition configuration");
            self.broadcast_config_update().await;
        }
    }

    /// Reacts to a detected node departure: drops it from every partition's
    /// node-set, drops its request queue for this database from the message
    /// service, and broadcasts the updated config.
    pub async fn remove_node(&self, node: &str, force: bool) {
        self.partitions.remove_node_in_partition(node, force);
        self.messages.drop_request_queue(node, &self.database);
        info!(node, force, "removed node from partition configuration");
        self.broadcast_config_update().await;
    }

    /// Serializes the current partition table and fire-and-forgets it to
    /// every node now in this database's partition, so peers pick up the
    /// membership change without waiting on a response.
    async fn broadcast_config_update(&self) {
        let nodes = self.partitions.nodes_for(&self.database, None);
        if nodes.is_empty() {
            return;
        }
        let snapshot: Payload = match serde_json::from_slice(&self.partitions.serialize()) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(database = %self.database, %err, "failed to decode serialized partition config for broadcast");
                return;
            }
        };
        let request = Request {
            id: RequestId::new(),
            sender: self.node.clone(),
            database: self.database.clone(),
            cluster: None,
            task: Arc::new(ConfigBroadcastTask { snapshot }),
            mode: ExecutionMode::NoResponse,
        };
        if let Err(err) = self.dispatcher.send_to_nodes(request, nodes).await {
            warn!(database = %self.database, %err, "failed to broadcast partition config update");
        }
    }
}
