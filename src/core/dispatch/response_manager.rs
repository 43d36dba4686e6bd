// src/core/dispatch/response_manager.rs

//! Per-request response aggregator (§4.3): collects per-node responses,
//! signals once the synchronous threshold is met, and reduces the final
//! result according to the task's result strategy.

use crate::core::message::{RequestId, Response};
use crate::core::task::{Payload, ResultStrategy, Task};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

struct State {
    responses: HashMap<String, Payload>,
    errors: HashMap<String, String>,
    arrival_order: Vec<String>,
    received_from_local: bool,
}

impl State {
    fn received_count(&self) -> usize {
        self.responses.len() + self.errors.len()
    }
}

/// Aggregates responses for one in-flight request.
pub struct ResponseManager {
    request_id: RequestId,
    local_node: String,
    expected_sync: usize,
    wait_local: bool,
    synchronous_timeout: Duration,
    total_timeout: Duration,
    state: Mutex<State>,
    notify: Notify,
}

impl ResponseManager {
    pub fn new(
        request_id: RequestId,
        local_node: impl Into<String>,
        expected_sync: usize,
        wait_local: bool,
        synchronous_timeout: Duration,
        total_timeout: Duration,
    ) -> Self {
        Self {
            request_id,
            local_node: local_node.into(),
            expected_sync: expected_sync.max(1),
            wait_local,
            synchronous_timeout,
            total_timeout,
            state: Mutex::new(State {
                responses: HashMap::new(),
                errors: HashMap::new(),
                arrival_order: Vec::new(),
                received_from_local: false,
            }),
            notify: Notify::new(),
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn total_timeout(&self) -> Duration {
        self.total_timeout
    }

    pub fn synchronous_timeout(&self) -> Duration {
        self.synchronous_timeout
    }

    /// Records a response and wakes any waiter if the synchronous threshold
    /// is now met.
    pub fn on_response(&self, response: Response) {
        let mut state = self.state.lock();
        let node = response.executor_node.clone();
        match response.result {
            Ok(payload) => {
                state.responses.insert(node.clone(), payload);
            }
            Err(err) => {
                state.errors.insert(node.clone(), err);
            }
        }
        state.arrival_order.push(node.clone());
        if node == self.local_node {
            state.received_from_local = true;
        }
        if self.threshold_met(&state) {
            drop(state);
            self.notify.notify_waiters();
        }
    }

    fn threshold_met(&self, state: &State) -> bool {
        state.received_count() >= self.expected_sync && (!self.wait_local || state.received_from_local)
    }

    /// Blocks until the synchronous threshold is met or `synchronous_timeout`
    /// elapses. Returns whether the threshold was actually met.
    ///
    /// The `Notified` future is created and enabled before the pre-check, not
    /// after, so an `on_response` landing between the check and the await
    /// can't be missed: `notify_waiters` only wakes futures already
    /// registered at the time it's called.
    pub async fn wait_for_synchronous_responses(&self) -> bool {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.threshold_met(&self.state.lock()) {
            return true;
        }
        let _ = tokio::time::timeout(self.synchronous_timeout, notified).await;
        self.threshold_met(&self.state.lock())
    }

    /// Reduces the collected responses per `strategy`.
    pub fn get_response(&self, task: &dyn Task, strategy: ResultStrategy) -> Option<Payload> {
        let state = self.state.lock();
        match strategy {
            ResultStrategy::First => state
                .arrival_order
                .iter()
                .find_map(|node| state.responses.get(node).cloned()),
            ResultStrategy::Any => state.responses.values().next().cloned(),
            ResultStrategy::Union => {
                if state.responses.is_empty() {
                    None
                } else {
                    let payloads: Vec<Payload> = state.responses.values().cloned().collect();
                    Some(task.merge(payloads))
                }
            }
            ResultStrategy::Majority => majority(&state.responses),
        }
    }

    pub fn received_count(&self) -> usize {
        self.state.lock().received_count()
    }
}

fn majority(responses: &HashMap<String, Payload>) -> Option<Payload> {
    if responses.is_empty() {
        return None;
    }
    let mut counts: HashMap<String, (usize, Payload, Vec<String>)> = HashMap::new();
    for (node, payload) in responses {
        let canon = canonical(payload);
        let entry = counts
            .entry(canon)
            .or_insert_with(|| (0, payload.clone(), Vec::new()));
        entry.0 += 1;
        entry.2.push(node.clone());
    }
    counts
        .into_values()
        .max_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| hash_of(&a.1).cmp(&hash_of(&b.1)))
                .then_with(|| a.2.iter().min().cmp(&b.2.iter().min()))
        })
        .map(|(_, payload, _)| payload)
}

fn canonical(payload: &Payload) -> String {
    serde_json::to_string(payload).unwrap_or_default()
}

fn hash_of(payload: &Payload) -> u64 {
    let mut hasher = DefaultHasher::new();
    canonical(payload).hash(&mut hasher);
    hasher.finish()
}

pub type SharedResponseManager = Arc<ResponseManager>;
