// src/core/mod.rs

//! Core logic of the replication coordinator: dispatch, inbound execution,
//! recovery, and the external interfaces they depend on.

pub mod database;
pub mod dispatch;
pub mod errors;
pub mod executor;
pub mod message;
pub mod message_service;
pub mod metrics;
pub mod partition;
pub mod primitives;
pub mod recovery;
pub mod task;

pub use errors::{CoordError, CoordResult};
pub use message::{Request, RequestId, Response};
pub use task::Task;
