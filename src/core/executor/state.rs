// src/core/executor/state.rs

//! Per-(node, database) executor state: the `online` gate and the
//! bootstrap-time task-type filter (§3, §5).

use crate::core::task::TaskKind;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Shared state read/written by the inbound executor and its bootstrap
/// controller. `online` uses `Notify` + `AtomicBool` rather than a raw
/// condvar; `wait_for_task_type` is a low-contention `Mutex<Option<_>>`.
pub struct ExecutorState {
    online: AtomicBool,
    online_notify: Notify,
    wait_for_task_type: Mutex<Option<TaskKind>>,
}

impl Default for ExecutorState {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorState {
    pub fn new() -> Self {
        Self {
            online: AtomicBool::new(false),
            online_notify: Notify::new(),
            wait_for_task_type: Mutex::new(None),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn set_online(&self) {
        self.online.store(true, Ordering::Release);
        self.online_notify.notify_waiters();
    }

    pub fn set_offline(&self) {
        self.online.store(false, Ordering::Release);
    }

    /// Blocks until `online` flips true, polling every 5 seconds (§4.2).
    pub async fn wait_until_online(&self) {
        while !self.is_online() {
            let notified = self.online_notify.notified();
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(Duration::from_secs(5)) => {}
            }
        }
    }

    /// Snapshots the filter. The inbound executor takes this snapshot once
    /// per loop iteration and acts on it - a concurrent clear is observed on
    /// the next iteration, never mid-check.
    pub fn wait_for_task_type(&self) -> Option<TaskKind> {
        *self.wait_for_task_type.lock()
    }

    pub fn set_wait_for_task_type(&self, kind: Option<TaskKind>) {
        *self.wait_for_task_type.lock() = kind;
    }

    pub fn clear_wait_for_task_type(&self) {
        self.set_wait_for_task_type(None);
    }
}
