// src/server/context.rs

use crate::config::Config;
use crate::core::dispatch::OutboundDispatcher;
use crate::core::executor::InboundExecutor;
use crate::core::message::{Request, Response};
use crate::core::message_service::MessageService;
use crate::core::partition::PartitionTable;
use crate::core::primitives::LocalClusterPrimitives;
use crate::core::recovery::RecoveryCoordinator;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

/// The reference cluster-primitives instantiation this binary wires up.
pub type Primitives = LocalClusterPrimitives<Request, Response>;

/// One database's fully-wired coordinator components.
pub struct DatabaseHandle {
    pub database: String,
    pub executor: Arc<InboundExecutor<Primitives>>,
    pub recovery: Arc<RecoveryCoordinator<Primitives>>,
}

/// Holds all initialized state required to run the coordinator's background
/// tasks.
pub struct ServerContext {
    pub config: Config,
    pub messages: Arc<MessageService<Primitives>>,
    pub partitions: Arc<PartitionTable>,
    pub dispatcher: Arc<OutboundDispatcher<Primitives>>,
    pub databases: Vec<DatabaseHandle>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
}
