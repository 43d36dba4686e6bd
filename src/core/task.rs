// src/core/task.rs

//! The task abstraction dispatched between nodes: quorum/result-strategy
//! capabilities plus the actual unit of work applied to the local database.

use crate::core::database::LocalDatabase;
use crate::core::errors::CoordError;
use std::fmt;
use std::time::Duration;

/// Stable discriminant carried by every task, compared by `wait_for_task_type`
/// instead of runtime type identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum TaskKind {
    Write,
    Read,
    Resync,
    Priming,
}

/// Quorum policy requested for a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuorumType {
    None,
    Read,
    Write,
    All,
}

/// Reduction policy applied to per-node responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultStrategy {
    First,
    Majority,
    Union,
    Any,
}

/// Whether a dispatch expects responses at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    Response,
    NoResponse,
    Resync,
}

/// Call-scoped marker threaded into `Task::execute` so nested writes know
/// whether they originate from replication, instead of an ambient thread-local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionOrigin {
    Local,
    Replicated,
}

/// Opaque, serializable result of applying a task.
pub type Payload = serde_json::Value;

/// A unit of work dispatched to one or more nodes.
///
/// Implementors are the "task payload" of the data model: they declare their
/// own quorum/timeout/gating policy and know how to apply themselves to a
/// `LocalDatabase` and how to combine their own per-node responses.
pub trait Task: Send + Sync + fmt::Debug {
    fn kind(&self) -> TaskKind;
    fn quorum_type(&self) -> QuorumType;
    fn result_strategy(&self) -> ResultStrategy;
    fn requires_node_online(&self) -> bool {
        true
    }

    /// Synchronous wait bound, given how many synchronous responses are expected.
    fn synchronous_timeout(&self, expected_sync: usize) -> Duration {
        let _ = expected_sync;
        Duration::from_secs(5)
    }

    /// Absolute wait bound, given the target node-set size.
    fn total_timeout(&self, node_count: usize) -> Duration {
        let _ = node_count;
        Duration::from_secs(15)
    }

    /// Applies this task to the local database. `origin` distinguishes a
    /// locally-originated call from one driven by the inbound executor.
    fn execute(
        &self,
        db: &dyn LocalDatabase,
        origin: ExecutionOrigin,
        sender: &str,
    ) -> Result<Payload, CoordError>;

    /// Merges a set of payloads under `ResultStrategy::Union`. Default is a
    /// JSON array concatenation; tasks with richer merge semantics override it.
    fn merge(&self, payloads: Vec<Payload>) -> Payload {
        Payload::Array(payloads)
    }
}
