// src/server/spawner.rs

//! Spawns all of the coordinator's long-running background tasks.

use super::context::ServerContext;
use super::metrics_server;
use anyhow::Result;
use tracing::info;

/// Spawns every background task (per-database inbound executor, per-database
/// resync loop, the response listener, and the metrics server) into the
/// context's `JoinSet`.
pub async fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    let shutdown_tx = ctx.shutdown_tx.clone();
    let background_tasks = &mut ctx.background_tasks;

    if ctx.config.metrics.enabled {
        let metrics_config = ctx.config.metrics.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            metrics_server::run_metrics_server(metrics_config, shutdown_rx).await;
            Ok(())
        });
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    let response_shutdown = shutdown_tx.subscribe();
    let messages = ctx.messages.clone();
    background_tasks.spawn(async move {
        messages.run_response_listener(response_shutdown).await;
        Ok(())
    });

    for handle in &ctx.databases {
        let executor = handle.executor.clone();
        let executor_shutdown = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            executor.run(executor_shutdown).await;
            Ok(())
        });

        let recovery = handle.recovery.clone();
        let resync_shutdown = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            recovery.run_resync_loop(resync_shutdown).await;
            Ok(())
        });
    }

    Ok(())
}
