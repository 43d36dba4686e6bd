// src/core/message.rs

//! Wire-level request/response types exchanged between dispatcher and executor.

use crate::core::task::{ExecutionMode, Payload, Task};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Cluster-unique identifier for a dispatched request. Stable for the
/// lifetime of its `ResponseManager` (I1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request in flight between the outbound dispatcher and a peer's inbound
/// executor.
#[derive(Clone)]
pub struct Request {
    pub id: RequestId,
    pub sender: String,
    pub database: String,
    pub cluster: Option<String>,
    pub task: Arc<dyn Task>,
    pub mode: ExecutionMode,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("sender", &self.sender)
            .field("database", &self.database)
            .field("cluster", &self.cluster)
            .field("task", &self.task)
            .field("mode", &self.mode)
            .finish()
    }
}

/// The outcome of one node applying (or failing to apply) a `Request`.
#[derive(Debug, Clone)]
pub struct Response {
    pub request_id: RequestId,
    pub executor_node: String,
    pub recipient_node: String,
    pub result: Result<Payload, String>,
}

impl Response {
    pub fn ok(request_id: RequestId, executor_node: &str, recipient_node: &str, payload: Payload) -> Self {
        Self {
            request_id,
            executor_node: executor_node.to_string(),
            recipient_node: recipient_node.to_string(),
            result: Ok(payload),
        }
    }

    pub fn err(request_id: RequestId, executor_node: &str, recipient_node: &str, error: String) -> Self {
        Self {
            request_id,
            executor_node: executor_node.to_string(),
            recipient_node: recipient_node.to_string(),
            result: Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
