// src/core/errors.rs

//! The primary error type for the replication coordinator.

use std::sync::Arc;
use thiserror::Error;

/// All failures the coordinator's public operations can surface, per the
/// error handling design: the outbound path returns these to callers, the
/// inbound path logs them and keeps the executor loop alive.
#[derive(Error, Debug, Clone)]
pub enum CoordError {
    #[error("no target nodes for dispatch")]
    NoTargets,

    #[error("quorum {quorum} unreachable with {available} available nodes")]
    QuorumUnreachable { quorum: usize, available: usize },

    #[error("dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("synchronous response threshold not met within timeout")]
    SynchronousTimeout,

    #[error("total timeout elapsed waiting for responses")]
    TotalTimeout,

    #[error("failed to enqueue response: {0}")]
    ResponseDispatchFailed(String),

    #[error("task execution failed: {0}")]
    ExecutorTaskError(String),

    #[error("shutdown signal received")]
    Shutdown,

    #[error("cluster primitive error: {0}")]
    Primitive(String),

    #[error("serialization error: {0}")]
    Serialization(Arc<serde_json::Error>),
}

impl PartialEq for CoordError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CoordError::NoTargets, CoordError::NoTargets) => true,
            (
                CoordError::QuorumUnreachable {
                    quorum: q1,
                    available: a1,
                },
                CoordError::QuorumUnreachable {
                    quorum: q2,
                    available: a2,
                },
            ) => q1 == q2 && a1 == a2,
            (CoordError::DispatchFailed(s1), CoordError::DispatchFailed(s2)) => s1 == s2,
            (CoordError::SynchronousTimeout, CoordError::SynchronousTimeout) => true,
            (CoordError::TotalTimeout, CoordError::TotalTimeout) => true,
            (CoordError::ResponseDispatchFailed(s1), CoordError::ResponseDispatchFailed(s2)) => {
                s1 == s2
            }
            (CoordError::ExecutorTaskError(s1), CoordError::ExecutorTaskError(s2)) => s1 == s2,
            (CoordError::Shutdown, CoordError::Shutdown) => true,
            (CoordError::Primitive(s1), CoordError::Primitive(s2)) => s1 == s2,
            (CoordError::Serialization(e1), CoordError::Serialization(e2)) => {
                e1.to_string() == e2.to_string()
            }
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl From<serde_json::Error> for CoordError {
    fn from(e: serde_json::Error) -> Self {
        CoordError::Serialization(Arc::new(e))
    }
}

pub type CoordResult<T> = Result<T, CoordError>;
