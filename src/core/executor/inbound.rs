// src/core/executor/inbound.rs

//! Inbound executor (§4.2): a dedicated worker per (local node, database)
//! that drains the request queue and applies messages serially, in the
//! undo/redo crash-recovery protocol.

use crate::core::database::LocalDatabase;
use crate::core::errors::CoordError;
use crate::core::executor::state::ExecutorState;
use crate::core::message::{Request, Response};
use crate::core::message_service::MessageService;
use crate::core::metrics::{EXECUTOR_PROCESSED_TOTAL, EXECUTOR_SKIPPED_TOTAL, UNDO_RECORDS_ACTIVE};
use crate::core::primitives::ClusterPrimitives;
use crate::core::task::ExecutionOrigin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

/// Drains `database`'s request queue on `node` and applies each request
/// serially, participating in the undo-record crash-recovery protocol (I3,
/// I4).
pub struct InboundExecutor<P: ClusterPrimitives<Request, Response>> {
    node: String,
    database: String,
    messages: Arc<MessageService<P>>,
    db: Arc<dyn LocalDatabase>,
    state: Arc<ExecutorState>,
    queue_timeout: Duration,
}

impl<P: ClusterPrimitives<Request, Response>> InboundExecutor<P> {
    pub fn new(
        node: impl Into<String>,
        database: impl Into<String>,
        messages: Arc<MessageService<P>>,
        db: Arc<dyn LocalDatabase>,
        state: Arc<ExecutorState>,
        queue_timeout: Duration,
    ) -> Self {
        Self {
            node: node.into(),
            database: database.into(),
            messages,
            db,
            state,
            queue_timeout,
        }
    }

    pub fn state(&self) -> &Arc<ExecutorState> {
        &self.state
    }

    /// The state-machine loop of §4.2, stated as: IDLE -> READING ->
    /// (WAITING_FOR_TASK_TYPE | WAITING_FOR_ONLINE | PROCESSING) -> IDLE,
    /// with any state exiting to SHUTDOWN on the cancellation signal.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let queue = self.messages.request_queue(&self.node, &self.database);
        loop {
            let request = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    debug!(database = %self.database, "inbound executor shutting down");
                    return;
                }
                taken = queue.take() => match taken {
                    Ok(request) => request,
                    Err(err) => {
                        error!(database = %self.database, %err, "request queue closed, stopping executor");
                        return;
                    }
                },
            };

            // WAITING_FOR_TASK_TYPE: snapshot-once, per the resolved race (§9).
            if let Some(expected) = self.state.wait_for_task_type() {
                if request.task.kind() != expected {
                    EXECUTOR_SKIPPED_TOTAL
                        .with_label_values(&[&self.database])
                        .inc();
                    debug!(database = %self.database, expected = %expected, got = %request.task.kind(), "skipping, task-type gated");
                    continue;
                }
                self.state.clear_wait_for_task_type();
            }

            // WAITING_FOR_ONLINE
            if !self.state.is_online() && request.task.requires_node_online() {
                self.state.wait_until_online().await;
            }

            self.process(request).await;
        }
    }

    pub(crate) async fn process(&self, request: Request) {
        let undo_map = self.messages.undo_map(&self.node, &self.database);
        undo_map.put(self.database.clone(), request.clone());
        UNDO_RECORDS_ACTIVE.with_label_values(&[&self.database]).set(1.0);

        let outcome = request
            .task
            .execute(self.db.as_ref(), ExecutionOrigin::Replicated, &request.sender);

        self.db.clear_level1_cache();

        let response = match outcome {
            Ok(payload) => Response::ok(request.id, &self.node, &request.sender, payload),
            Err(err) => {
                warn!(database = %self.database, %err, "task execution failed");
                Response::err(request.id, &self.node, &request.sender, err.to_string())
            }
        };

        self.deliver(&request, response).await;

        undo_map.remove(&self.database);
        UNDO_RECORDS_ACTIVE.with_label_values(&[&self.database]).set(0.0);
        EXECUTOR_PROCESSED_TOTAL.with_label_values(&[&self.database]).inc();
    }

    async fn deliver(&self, request: &Request, response: Response) {
        let queue = self.messages.response_queue(&request.sender);
        if let Err(err) = queue.offer(response, self.queue_timeout).await {
            // ResponseDispatchFailed: logged, not re-thrown. The request is
            // still considered applied locally; the undo record is cleared
            // by the caller regardless of this outcome.
            let failed: CoordError = CoordError::ResponseDispatchFailed(err.to_string());
            warn!(database = %self.database, request_id = %request.id, %failed, "failed to deliver response");
        }
    }

    /// Drains any pending entries already sitting in the request queue,
    /// applying each one, until the queue is empty for `idle_after`. Used by
    /// the recovery coordinator's `unqueue_pending` step before going online.
    pub async fn drain_pending(&self, idle_after: Duration) -> usize {
        let queue = self.messages.request_queue(&self.node, &self.database);
        let mut drained = 0;
        loop {
            match tokio::time::timeout(idle_after, queue.take()).await {
                Ok(Ok(request)) => {
                    self.process(request).await;
                    drained += 1;
                }
                _ => break,
            }
        }
        drained
    }

    /// Replays the request currently held in the undo record, if any (§4.4
    /// crash recovery). Used by the recovery coordinator at startup.
    pub async fn replay_undo_record(&self) -> bool {
        let undo_map = self.messages.undo_map(&self.node, &self.database);
        match undo_map.get(&self.database) {
            Some(request) => {
                debug!(database = %self.database, request_id = %request.id, "replaying undo record");
                self.process(request).await;
                true
            }
            None => false,
        }
    }
}
