// src/server/initialization.rs

//! Builds every coordinator component before the background tasks are
//! spawned: cluster primitives, partition table, message service, outbound
//! dispatcher, and one executor/recovery-coordinator pair per database.

use super::context::{DatabaseHandle, Primitives, ServerContext};
use crate::config::Config;
use crate::core::database::{InMemoryDatabase, LocalDatabase};
use crate::core::dispatch::OutboundDispatcher;
use crate::core::executor::{ExecutorState, InboundExecutor};
use crate::core::message_service::MessageService;
use crate::core::metrics::ONLINE_DATABASES;
use crate::core::partition::{PartitionConfig, PartitionDirectory, PartitionTable};
use crate::core::primitives::LocalClusterPrimitives;
use crate::core::recovery::RecoveryCoordinator;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::info;

/// Initializes all coordinator components before starting the background
/// tasks.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(16);

    let primitives: Arc<Primitives> = Arc::new(LocalClusterPrimitives::new(config.node_name.clone()));
    let messages = Arc::new(MessageService::new(primitives));

    let partitions = Arc::new(PartitionTable::new(config.resync_every()));
    for database in &config.databases {
        let mut partition_config = PartitionConfig::new(vec![config.node_name.clone()]);
        partition_config.read_quorum = config.partition_defaults.read_quorum;
        partition_config.write_quorum = config.partition_defaults.write_quorum;
        partition_config.read_your_writes = config.partition_defaults.read_your_writes;
        partition_config.fail_when_available_less_than_quorum =
            config.partition_defaults.fail_when_available_less_than_quorum;
        partition_config.partition_strategy = config.partition_defaults.partition_strategy.clone();
        partitions.register(database, None, partition_config);
    }

    let dispatcher = Arc::new(OutboundDispatcher::new(
        messages.clone(),
        partitions.clone() as Arc<dyn PartitionDirectory>,
        config.distributed_queue_timeout(),
    ));

    let mut databases = Vec::with_capacity(config.databases.len());
    for database in &config.databases {
        let db: Arc<dyn LocalDatabase> = Arc::new(InMemoryDatabase::new());
        let state = Arc::new(ExecutorState::new());
        let executor = Arc::new(InboundExecutor::new(
            config.node_name.clone(),
            database.clone(),
            messages.clone(),
            db,
            state,
            config.distributed_queue_timeout(),
        ));
        let recovery = Arc::new(RecoveryCoordinator::new(
            config.node_name.clone(),
            database.clone(),
            partitions.clone(),
            dispatcher.clone(),
            messages.clone(),
        ));
        databases.push(DatabaseHandle {
            database: database.clone(),
            executor,
            recovery,
        });
    }

    Ok(ServerContext {
        config,
        messages,
        partitions,
        dispatcher,
        databases,
        shutdown_tx,
        background_tasks: JoinSet::new(),
    })
}

/// Runs startup recovery (undo replay, pending drain, going online) for
/// every database, then reports membership. Must run before the inbound
/// executors are spawned so no request is missed between "queue exists" and
/// "executor online".
pub async fn recover_and_go_online(ctx: &ServerContext) {
    for handle in &ctx.databases {
        handle.recovery.check_local_in_configuration().await;
        handle
            .recovery
            .configure_database(&handle.executor, true, true)
            .await;
        info!(database = %handle.database, "database online");
    }
    ONLINE_DATABASES.set(ctx.databases.len() as f64);
}

fn log_startup_info(config: &Config) {
    info!(
        node_name = %config.node_name,
        databases = config.databases.len(),
        "starting replication coordinator"
    );
}
