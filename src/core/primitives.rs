// src/core/primitives.rs

//! The cluster-membership/queue/map/lock substrate the coordinator builds on.
//!
//! `ClusterPrimitives` is the narrow contract the CORE depends on; the real
//! distributed implementation lives outside this crate. `LocalClusterPrimitives`
//! is an in-process reference implementation (async channels + `DashMap` +
//! a semaphore-backed mutex) that makes the crate runnable and testable
//! standalone.

use crate::core::errors::CoordError;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex as SyncMutex;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore, mpsc};

/// A cluster-durable FIFO queue of `T`.
#[async_trait]
pub trait Queue<T: Send + 'static>: Send + Sync {
    async fn offer(&self, item: T, timeout: Duration) -> Result<(), CoordError>;
    /// Cancellable blocking take. Callers race this against a shutdown signal.
    async fn take(&self) -> Result<T, CoordError>;
}

/// A cluster-visible keyed map with atomic single-key operations.
pub trait ClusterMap<K, V>: Send + Sync {
    fn put(&self, key: K, value: V) -> Option<V>;
    fn get(&self, key: &K) -> Option<V>;
    fn remove(&self, key: &K) -> Option<V>;
}

/// A reentrant cluster-wide mutex. Held only across the broadcast loop, never
/// across user code or unbounded I/O.
#[async_trait]
pub trait ClusterLock: Send + Sync {
    async fn acquire(&self, timeout: Duration) -> Result<(), CoordError>;
    fn release(&self);
}

/// RAII guard releasing a `ClusterLock` on drop.
pub struct LockGuard<'a> {
    lock: &'a dyn ClusterLock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// Acquires `lock`, returning a guard that releases it on drop.
pub async fn acquire<'a>(
    lock: &'a dyn ClusterLock,
    timeout: Duration,
) -> Result<LockGuard<'a>, CoordError> {
    lock.acquire(timeout).await?;
    Ok(LockGuard { lock })
}

/// Queue/map/lock/liveness contract the CORE depends on.
pub trait ClusterPrimitives<T, R>: Send + Sync
where
    T: Send + 'static,
    R: Send + 'static,
{
    fn local_node(&self) -> &str;
    fn is_alive(&self, node: &str) -> bool;
    fn request_queue(&self, node: &str, database: &str) -> Arc<dyn Queue<T>>;
    /// Drops a node's request queue, e.g. once it has left the partition.
    /// A later `request_queue` call for the same `(node, database)` vends a
    /// fresh, empty queue.
    fn remove_request_queue(&self, node: &str, database: &str);
    fn response_queue(&self, node: &str) -> Arc<dyn Queue<R>>;
    fn undo_map(&self, node: &str, database: &str) -> Arc<dyn ClusterMap<String, T>>;
    fn lock(&self, database: &str) -> Arc<dyn ClusterLock>;
}

/// Queue naming scheme, per the external interface contract.
pub fn request_queue_name(node: &str, database: &str) -> String {
    format!("coord.node.{node}.{database}.request")
}

pub fn response_queue_name(node: &str) -> String {
    format!("coord.node.{node}.response")
}

pub fn undo_map_name(node: &str, database: &str) -> String {
    format!("coord.node.{node}.{database}.undo")
}

pub fn reqlock_name(database: &str) -> String {
    format!("coord.reqlock.{database}")
}

struct LocalQueue<T> {
    sender: mpsc::UnboundedSender<T>,
    receiver: AsyncMutex<mpsc::UnboundedReceiver<T>>,
}

impl<T: Send + 'static> LocalQueue<T> {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: AsyncMutex::new(receiver),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Queue<T> for LocalQueue<T> {
    async fn offer(&self, item: T, timeout: Duration) -> Result<(), CoordError> {
        tokio::time::timeout(timeout, async { self.sender.send(item) })
            .await
            .map_err(|_| CoordError::Primitive("offer timed out".into()))?
            .map_err(|_| CoordError::Primitive("queue closed".into()))
    }

    async fn take(&self) -> Result<T, CoordError> {
        let mut receiver = self.receiver.lock().await;
        receiver
            .recv()
            .await
            .ok_or_else(|| CoordError::Primitive("queue closed".into()))
    }
}

struct LocalMap<K, V> {
    inner: DashMap<K, V>,
}

impl<K: Eq + Hash, V> LocalMap<K, V> {
    fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Send + Sync, V: Clone + Send + Sync> ClusterMap<K, V> for LocalMap<K, V> {
    fn put(&self, key: K, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.inner.remove(key).map(|(_, v)| v)
    }
}

struct LocalClusterLock {
    semaphore: Arc<Semaphore>,
    held: SyncMutex<Option<OwnedSemaphorePermit>>,
}

impl LocalClusterLock {
    fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            held: SyncMutex::new(None),
        }
    }
}

#[async_trait]
impl ClusterLock for LocalClusterLock {
    async fn acquire(&self, timeout: Duration) -> Result<(), CoordError> {
        let permit = tokio::time::timeout(timeout, self.semaphore.clone().acquire_owned())
            .await
            .map_err(|_| CoordError::Primitive("lock acquire timed out".into()))?
            .map_err(|_| CoordError::Primitive("lock closed".into()))?;
        *self.held.lock() = Some(permit);
        Ok(())
    }

    fn release(&self) {
        self.held.lock().take();
    }
}

/// In-process reference `ClusterPrimitives`: async channels for queues,
/// `DashMap` for maps, a semaphore-backed mutex for locks.
pub struct LocalClusterPrimitives<T, R> {
    local_node: String,
    alive: DashMap<String, bool>,
    request_queues: DashMap<String, Arc<LocalQueue<T>>>,
    response_queues: DashMap<String, Arc<LocalQueue<R>>>,
    undo_maps: DashMap<String, Arc<LocalMap<String, T>>>,
    locks: DashMap<String, Arc<LocalClusterLock>>,
}

impl<T: Send + 'static, R: Send + 'static> LocalClusterPrimitives<T, R> {
    pub fn new(local_node: impl Into<String>) -> Self {
        let local_node = local_node.into();
        let alive = DashMap::new();
        alive.insert(local_node.clone(), true);
        Self {
            local_node,
            alive,
            request_queues: DashMap::new(),
            response_queues: DashMap::new(),
            undo_maps: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Registers `node` as a known cluster member, alive by default.
    pub fn register_node(&self, node: impl Into<String>) {
        self.alive.entry(node.into()).or_insert(true);
    }

    /// Test/ops hook: marks a node as unreachable without removing its queues.
    pub fn set_alive(&self, node: &str, alive: bool) {
        self.alive.insert(node.to_string(), alive);
    }
}

impl<T: Send + 'static, R: Send + 'static> ClusterPrimitives<T, R> for LocalClusterPrimitives<T, R> {
    fn local_node(&self) -> &str {
        &self.local_node
    }

    fn is_alive(&self, node: &str) -> bool {
        self.alive.get(node).map(|v| *v).unwrap_or(false)
    }

    fn request_queue(&self, node: &str, database: &str) -> Arc<dyn Queue<T>> {
        let name = request_queue_name(node, database);
        self.request_queues
            .entry(name)
            .or_insert_with(|| Arc::new(LocalQueue::new()))
            .clone()
    }

    fn remove_request_queue(&self, node: &str, database: &str) {
        let name = request_queue_name(node, database);
        self.request_queues.remove(&name);
    }

    fn response_queue(&self, node: &str) -> Arc<dyn Queue<R>> {
        let name = response_queue_name(node);
        self.response_queues
            .entry(name)
            .or_insert_with(|| Arc::new(LocalQueue::new()))
            .clone()
    }

    fn undo_map(&self, node: &str, database: &str) -> Arc<dyn ClusterMap<String, T>> {
        let name = undo_map_name(node, database);
        self.undo_maps
            .entry(name)
            .or_insert_with(|| Arc::new(LocalMap::new()))
            .clone()
    }

    fn lock(&self, database: &str) -> Arc<dyn ClusterLock> {
        let name = reqlock_name(database);
        self.locks
            .entry(name)
            .or_insert_with(|| Arc::new(LocalClusterLock::new()))
            .clone()
    }
}
