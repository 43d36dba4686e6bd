// tests/support/mod.rs

//! Shared test harness: builds a single-process N-node cluster over the
//! in-memory reference primitives, plus a few small `Task` implementations
//! used across the integration tests.

#![allow(dead_code)]

use replicoord::core::database::{InMemoryDatabase, LocalDatabase};
use replicoord::core::dispatch::OutboundDispatcher;
use replicoord::core::errors::CoordError;
use replicoord::core::executor::{ExecutorState, InboundExecutor};
use replicoord::core::message::{Request, Response};
use replicoord::core::message_service::MessageService;
use replicoord::core::partition::{PartitionConfig, PartitionDirectory, PartitionTable};
use replicoord::core::primitives::LocalClusterPrimitives;
use replicoord::core::task::{ExecutionOrigin, Payload, QuorumType, ResultStrategy, Task, TaskKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub type Primitives = LocalClusterPrimitives<Request, Response>;

/// A single-process stand-in for a cluster: one shared queue/lock substrate,
/// one dispatcher, and one `InboundExecutor` per simulated node, all wired
/// to database `"db"`.
pub struct Cluster {
    pub dispatcher: Arc<OutboundDispatcher<Primitives>>,
    pub messages: Arc<MessageService<Primitives>>,
    pub partitions: Arc<PartitionTable>,
    pub primitives: Arc<Primitives>,
    pub nodes: Vec<String>,
    pub dbs: Vec<Arc<InMemoryDatabase>>,
    pub executors: Vec<Arc<InboundExecutor<Primitives>>>,
    pub shutdown_tx: broadcast::Sender<()>,
}

impl Cluster {
    pub fn db(&self, idx: usize) -> &Arc<InMemoryDatabase> {
        &self.dbs[idx]
    }

    pub fn executor(&self, idx: usize) -> &Arc<InboundExecutor<Primitives>> {
        &self.executors[idx]
    }

    /// Spawns every node's inbound executor loop.
    pub fn spawn_executors(&self) -> Vec<JoinHandle<()>> {
        self.executors
            .iter()
            .map(|e| {
                let e = e.clone();
                let rx = self.shutdown_tx.subscribe();
                tokio::spawn(async move { e.run(rx).await })
            })
            .collect()
    }

    /// Spawns the dispatching node's response listener.
    pub fn spawn_response_listener(&self) -> JoinHandle<()> {
        let messages = self.messages.clone();
        let rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move { messages.run_response_listener(rx).await })
    }
}

/// Builds an `node_count`-node cluster for database `"db"`, all nodes alive
/// and all executors online, customizing the partition config via `cfg`.
pub fn build(node_count: usize, cfg: impl FnOnce(&mut PartitionConfig)) -> Cluster {
    let nodes: Vec<String> = (1..=node_count).map(|i| format!("n{i}")).collect();
    let local_node = nodes[0].clone();

    let primitives = Arc::new(LocalClusterPrimitives::<Request, Response>::new(local_node));
    for n in &nodes {
        primitives.register_node(n.clone());
    }

    let messages = Arc::new(MessageService::new(primitives.clone()));
    let partitions = Arc::new(PartitionTable::new(Duration::from_secs(0)));
    let mut partition_config = PartitionConfig::new(nodes.clone());
    cfg(&mut partition_config);
    partitions.register("db", None, partition_config);

    let dispatcher = Arc::new(OutboundDispatcher::new(
        messages.clone(),
        partitions.clone() as Arc<dyn PartitionDirectory>,
        Duration::from_millis(500),
    ));

    let mut dbs = Vec::with_capacity(node_count);
    let mut executors = Vec::with_capacity(node_count);
    for n in &nodes {
        let db = Arc::new(InMemoryDatabase::new());
        let state = Arc::new(ExecutorState::new());
        let executor = Arc::new(InboundExecutor::new(
            n.clone(),
            "db",
            messages.clone(),
            db.clone() as Arc<dyn LocalDatabase>,
            state,
            Duration::from_millis(500),
        ));
        executor.state().set_online();
        dbs.push(db);
        executors.push(executor);
    }

    let (shutdown_tx, _) = broadcast::channel(16);

    Cluster {
        dispatcher,
        messages,
        partitions,
        primitives,
        nodes,
        dbs,
        executors,
        shutdown_tx,
    }
}

/// Stores `value` at `key` on whatever local database it runs against, and
/// echoes it back as the response payload.
#[derive(Debug, Clone)]
pub struct RecordTask {
    pub key: String,
    pub value: Payload,
    pub quorum_type: QuorumType,
    pub result_strategy: ResultStrategy,
}

impl Task for RecordTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Write
    }

    fn quorum_type(&self) -> QuorumType {
        self.quorum_type
    }

    fn result_strategy(&self) -> ResultStrategy {
        self.result_strategy
    }

    // Short bounds so tests that exercise a timeout don't sit for the
    // production defaults (5s / 15s).
    fn synchronous_timeout(&self, _expected_sync: usize) -> Duration {
        Duration::from_millis(150)
    }

    fn total_timeout(&self, _node_count: usize) -> Duration {
        Duration::from_millis(300)
    }

    fn execute(
        &self,
        db: &dyn LocalDatabase,
        _origin: ExecutionOrigin,
        _sender: &str,
    ) -> Result<Payload, CoordError> {
        db.put(&self.key, self.value.clone());
        Ok(self.value.clone())
    }
}

/// Reads whatever is seeded at `"seed"` on the local database it runs
/// against. Used to produce a distinct payload per node for UNION tests.
#[derive(Debug)]
pub struct SnapshotTask;

impl Task for SnapshotTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Read
    }

    fn quorum_type(&self) -> QuorumType {
        QuorumType::All
    }

    fn result_strategy(&self) -> ResultStrategy {
        ResultStrategy::Union
    }

    fn execute(
        &self,
        db: &dyn LocalDatabase,
        _origin: ExecutionOrigin,
        _sender: &str,
    ) -> Result<Payload, CoordError> {
        Ok(db.get("seed").unwrap_or(Payload::Null))
    }
}

/// Appends `label` onto the JSON array stored at `"order"`, returning the
/// array as it stood after the append. Used to observe per-node apply order.
#[derive(Debug)]
pub struct AppendTask {
    pub label: String,
}

impl Task for AppendTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Write
    }

    fn quorum_type(&self) -> QuorumType {
        QuorumType::All
    }

    fn result_strategy(&self) -> ResultStrategy {
        ResultStrategy::Any
    }

    fn execute(
        &self,
        db: &dyn LocalDatabase,
        _origin: ExecutionOrigin,
        _sender: &str,
    ) -> Result<Payload, CoordError> {
        let mut arr = db
            .get("order")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();
        arr.push(Payload::String(self.label.clone()));
        db.put("order", Payload::Array(arr.clone()));
        Ok(Payload::Array(arr))
    }
}
