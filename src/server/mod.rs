// src/server/mod.rs

use crate::config::Config;
use anyhow::Result;
use tracing::info;

pub mod context;
mod initialization;
mod metrics_server;
mod spawner;

pub use context::ServerContext;

/// Orchestrates startup: build every component, run crash recovery and bring
/// databases online, spawn the background tasks, then block until shutdown.
pub async fn run(config: Config) -> Result<()> {
    let mut ctx = initialization::setup(config).await?;

    initialization::recover_and_go_online(&ctx).await;

    spawner::spawn_all(&mut ctx).await?;

    info!("replication coordinator running");
    while let Some(result) = ctx.background_tasks.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(%err, "background task failed"),
            Err(join_err) => tracing::error!(%join_err, "background task panicked"),
        }
    }

    Ok(())
}

/// Signals every background task to stop and waits for them to drain.
pub async fn shutdown(ctx: &mut ServerContext) {
    let _ = ctx.shutdown_tx.send(());
    while ctx.background_tasks.join_next().await.is_some() {}
}
