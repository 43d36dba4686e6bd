// src/core/dispatch/dispatcher.rs

//! Outbound dispatcher (§4.1): broadcasts a request under the per-database
//! cluster lock, then collects and reduces responses.

use crate::core::dispatch::quorum::compute_quorum;
use crate::core::dispatch::response_manager::ResponseManager;
use crate::core::errors::CoordError;
use crate::core::message::{Request, Response};
use crate::core::message_service::MessageService;
use crate::core::metrics::{DISPATCH_LATENCY_SECONDS, DISPATCH_TOTAL};
use crate::core::partition::PartitionDirectory;
use crate::core::primitives::{self, ClusterPrimitives};
use crate::core::task::{ExecutionMode, Payload, ResultStrategy};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info_span, warn};

/// Broadcasts requests to the peer set owning a shard and aggregates the
/// responses per the task's quorum/result-strategy policy.
pub struct OutboundDispatcher<P: ClusterPrimitives<Request, Response>> {
    messages: Arc<MessageService<P>>,
    partitions: Arc<dyn PartitionDirectory>,
    queue_timeout: Duration,
}

impl<P: ClusterPrimitives<Request, Response>> OutboundDispatcher<P> {
    pub fn new(
        messages: Arc<MessageService<P>>,
        partitions: Arc<dyn PartitionDirectory>,
        queue_timeout: Duration,
    ) -> Self {
        Self {
            messages,
            partitions,
            queue_timeout,
        }
    }

    /// Resolves the target node-set for `request`'s (database, cluster) and
    /// delegates to `send_to_nodes`.
    pub async fn send(&self, mut request: Request) -> Result<Payload, CoordError> {
        let nodes = self
            .partitions
            .nodes_for(&request.database, request.cluster.as_deref());
        request.sender = self.messages.local_node().to_string();
        self.send_to_nodes(request, nodes).await
    }

    pub async fn send_to_nodes(
        &self,
        mut request: Request,
        nodes: Vec<String>,
    ) -> Result<Payload, CoordError> {
        if nodes.is_empty() {
            return Err(CoordError::NoTargets);
        }

        let database = request.database.clone();
        let shard = request.cluster.clone();
        let task = request.task.clone();

        let quorum = compute_quorum(
            &database,
            task.quorum_type(),
            nodes.len(),
            self.partitions.read_quorum(&database, shard.as_deref()),
            self.partitions.write_quorum(&database, shard.as_deref()),
            self.partitions
                .fail_when_available_less_than_quorum(&database, shard.as_deref()),
        )?;

        request.sender = self.messages.local_node().to_string();

        let available_nodes = nodes
            .iter()
            .filter(|n| self.messages.is_alive(n))
            .count();

        let expected_sync = if task.result_strategy() == ResultStrategy::Union {
            available_nodes.max(1)
        } else {
            quorum.min(available_nodes).max(1)
        };

        let wait_local = nodes.iter().any(|n| n == self.messages.local_node())
            && self
                .partitions
                .read_your_writes(&database, shard.as_deref());

        let manager = Arc::new(ResponseManager::new(
            request.id,
            self.messages.local_node(),
            expected_sync,
            wait_local,
            task.synchronous_timeout(expected_sync),
            task.total_timeout(nodes.len()),
        ));
        self.messages.register(request.id, manager.clone());

        let span = info_span!("dispatch", database = %database, request_id = %request.id);
        let _guard = span.enter();

        if let Err(err) = self.broadcast(&request, &nodes, &database).await {
            self.messages.unregister(request.id);
            DISPATCH_TOTAL.with_label_values(&[&database, "dispatch_failed"]).inc();
            return Err(err);
        }

        if request.mode == ExecutionMode::NoResponse {
            self.messages.unregister(request.id);
            DISPATCH_TOTAL.with_label_values(&[&database, "fire_and_forget"]).inc();
            return Ok(Payload::Null);
        }

        let started = Instant::now();
        let result = self.collect(&manager, task.as_ref(), &database).await;
        DISPATCH_LATENCY_SECONDS
            .with_label_values(&[&database])
            .observe(started.elapsed().as_secs_f64());
        self.messages.unregister(request.id);
        result
    }

    async fn broadcast(
        &self,
        request: &Request,
        nodes: &[String],
        database: &str,
    ) -> Result<(), CoordError> {
        let lock = self.messages.lock(database);
        let guard = primitives::acquire(&*lock, self.queue_timeout)
            .await
            .map_err(|e| CoordError::DispatchFailed(format!("cluster lock: {e}")))?;

        for node in nodes {
            let queue = self.messages.request_queue(node, database);
            queue
                .offer(request.clone(), self.queue_timeout)
                .await
                .map_err(|e| CoordError::DispatchFailed(format!("offer to {node}: {e}")))?;
        }
        drop(guard);
        Ok(())
    }

    async fn collect(
        &self,
        manager: &Arc<ResponseManager>,
        task: &dyn crate::core::task::Task,
        database: &str,
    ) -> Result<Payload, CoordError> {
        let total_timeout = manager.total_timeout();
        let met = match tokio::time::timeout(total_timeout, manager.wait_for_synchronous_responses())
            .await
        {
            Ok(met) => met,
            Err(_) => {
                DISPATCH_TOTAL.with_label_values(&[database, "total_timeout"]).inc();
                return Err(CoordError::TotalTimeout);
            }
        };

        if !met {
            warn!(database, "synchronous timeout elapsed, returning best-effort aggregation");
            DISPATCH_TOTAL
                .with_label_values(&[database, "synchronous_timeout"])
                .inc();
        } else {
            DISPATCH_TOTAL.with_label_values(&[database, "ok"]).inc();
        }

        Ok(manager
            .get_response(task, task.result_strategy())
            .unwrap_or(Payload::Null))
    }
}
