// tests/dispatch.rs
//
// Outbound dispatcher scenarios: quorum-gated writes, partial availability,
// UNION fan-in, and strict quorum rejection.

mod support;

use replicoord::core::message::{Request, RequestId};
use replicoord::core::task::{ExecutionMode, Payload, QuorumType, ResultStrategy};
use replicoord::{CoordError, Task};
use std::sync::Arc;
use std::time::Duration;
use support::{RecordTask, SnapshotTask};

fn write_request(task: Arc<dyn Task>, sender: &str) -> Request {
    Request {
        id: RequestId::new(),
        sender: sender.to_string(),
        database: "db".to_string(),
        cluster: None,
        task,
        mode: ExecutionMode::Response,
    }
}

/// Scenario 1: three-node WRITE, write_quorum=2. Dispatch completes once any
/// two responses arrive, returning the agreed-upon payload.
#[tokio::test]
async fn three_node_write_completes_on_quorum() {
    let cluster = support::build(3, |cfg| {
        cfg.write_quorum = 2;
        cfg.read_quorum = 1;
    });
    let _executors = cluster.spawn_executors();
    let _listener = cluster.spawn_response_listener();

    let task: Arc<dyn Task> = Arc::new(RecordTask {
        key: "k".into(),
        value: Payload::from(42),
        quorum_type: QuorumType::Write,
        result_strategy: ResultStrategy::Majority,
    });
    let request = write_request(task, &cluster.nodes[0]);

    let result = cluster.dispatcher.send(request).await.unwrap();
    assert_eq!(result, Payload::from(42));

    // every live node eventually applies the write, even the one whose
    // response arrived after the quorum was already satisfied.
    tokio::time::sleep(Duration::from_millis(50)).await;
    for i in 0..3 {
        assert_eq!(cluster.db(i).get("k"), Some(Payload::from(42)));
    }
}

/// Scenario 2: one of three nodes unavailable. The dispatch still completes
/// on the two live nodes, and the unreachable node's queue keeps the message
/// for whenever it returns.
#[tokio::test]
async fn one_of_three_unavailable_still_reaches_quorum() {
    let cluster = support::build(3, |cfg| {
        cfg.write_quorum = 2;
    });
    cluster.primitives.set_alive(&cluster.nodes[2], false);

    // only n1 and n2 run executors; n3 is "down" and never drains its queue.
    let rx1 = cluster.shutdown_tx.subscribe();
    let rx2 = cluster.shutdown_tx.subscribe();
    let e1 = cluster.executor(0).clone();
    let e2 = cluster.executor(1).clone();
    tokio::spawn(async move { e1.run(rx1).await });
    tokio::spawn(async move { e2.run(rx2).await });
    let _listener = cluster.spawn_response_listener();

    let task: Arc<dyn Task> = Arc::new(RecordTask {
        key: "k".into(),
        value: Payload::from("v"),
        quorum_type: QuorumType::Write,
        result_strategy: ResultStrategy::Majority,
    });
    let request = write_request(task, &cluster.nodes[0]);
    cluster.dispatcher.send(request).await.unwrap();

    // the message is still sitting in n3's request queue, undrained.
    let n3_queue = cluster.messages.request_queue(&cluster.nodes[2], "db");
    let pending = tokio::time::timeout(Duration::from_millis(50), n3_queue.take()).await;
    assert!(pending.is_ok(), "n3's queue should still hold the message");
}

/// Scenario 3: UNION aggregation returns the multiset union of every live
/// node's distinct response.
#[tokio::test]
async fn union_strategy_merges_every_node_response() {
    let cluster = support::build(3, |cfg| {
        cfg.write_quorum = 1;
    });
    cluster.db(0).put("seed", serde_json::json!({"a": 1}));
    cluster.db(1).put("seed", serde_json::json!({"b": 2}));
    cluster.db(2).put("seed", serde_json::json!({"c": 3}));

    let _executors = cluster.spawn_executors();
    let _listener = cluster.spawn_response_listener();

    let task: Arc<dyn Task> = Arc::new(SnapshotTask);
    let request = write_request(task, &cluster.nodes[0]);
    let result = cluster.dispatcher.send(request).await.unwrap();

    let merged = result.as_array().expect("union result is an array");
    assert_eq!(merged.len(), 3);
    assert!(merged.contains(&serde_json::json!({"a": 1})));
    assert!(merged.contains(&serde_json::json!({"b": 2})));
    assert!(merged.contains(&serde_json::json!({"c": 3})));
}

/// Scenario 5 / P4 (strict branch): configured quorum exceeds the target set
/// and `fail_when_available_less_than_quorum=true` raises `QuorumUnreachable`
/// without enqueuing anything.
#[tokio::test]
async fn quorum_unreachable_strict_rejects_before_enqueue() {
    let cluster = support::build(3, |cfg| {
        cfg.write_quorum = 5;
        cfg.fail_when_available_less_than_quorum = true;
    });

    let task: Arc<dyn Task> = Arc::new(RecordTask {
        key: "k".into(),
        value: Payload::from(1),
        quorum_type: QuorumType::Write,
        result_strategy: ResultStrategy::Any,
    });
    let request = write_request(task, &cluster.nodes[0]);
    let err = cluster.dispatcher.send(request).await.unwrap_err();
    assert_eq!(
        err,
        CoordError::QuorumUnreachable {
            quorum: 5,
            available: 3
        }
    );

    for i in 0..3 {
        let queue = cluster.messages.request_queue(&cluster.nodes[i], "db");
        assert!(
            tokio::time::timeout(Duration::from_millis(20), queue.take())
                .await
                .is_err(),
            "no message should have been enqueued to node {i}"
        );
    }
}

/// P4 (downgrade branch): the same oversized quorum, but with the strict
/// flag off, downgrades to the target set's size instead of failing.
#[tokio::test]
async fn quorum_unreachable_downgrades_when_not_strict() {
    let cluster = support::build(3, |cfg| {
        cfg.write_quorum = 5;
        cfg.fail_when_available_less_than_quorum = false;
    });
    let _executors = cluster.spawn_executors();
    let _listener = cluster.spawn_response_listener();

    let task: Arc<dyn Task> = Arc::new(RecordTask {
        key: "k".into(),
        value: Payload::from(7),
        quorum_type: QuorumType::Write,
        result_strategy: ResultStrategy::Majority,
    });
    let request = write_request(task, &cluster.nodes[0]);
    let result = cluster.dispatcher.send(request).await.unwrap();
    assert_eq!(result, Payload::from(7));
}

/// P6: with read-your-writes enabled, the remote node's response alone does
/// not satisfy the synchronous threshold; the dispatch must exhaust the
/// task's synchronous window waiting on the local response before returning.
#[tokio::test]
async fn read_your_writes_waits_out_the_synchronous_window() {
    let cluster = support::build(2, |cfg| {
        cfg.write_quorum = 1;
        cfg.read_your_writes = true;
    });

    // only the remote node's executor runs; the local node (n1) never
    // applies the request.
    let rx = cluster.shutdown_tx.subscribe();
    let remote = cluster.executor(1).clone();
    tokio::spawn(async move { remote.run(rx).await });
    let _listener = cluster.spawn_response_listener();

    let task: Arc<dyn Task> = Arc::new(RecordTask {
        key: "k".into(),
        value: Payload::from(1),
        quorum_type: QuorumType::Write,
        result_strategy: ResultStrategy::Any,
    });
    let request = write_request(task, &cluster.nodes[0]);
    let started = std::time::Instant::now();
    let result = cluster.dispatcher.send(request).await.unwrap();
    let elapsed = started.elapsed();

    // RecordTask's synchronous_timeout is 150ms; without read-your-writes
    // the remote's immediate response would satisfy threshold right away.
    assert!(
        elapsed >= Duration::from_millis(140),
        "expected the dispatch to wait out the synchronous window, elapsed={elapsed:?}"
    );
    assert_eq!(result, Payload::from(1));
}

/// A task that never gets a response (no executor ever drains its queue),
/// with a total timeout shorter than its own synchronous window, so the
/// absolute bound fires first.
#[derive(Debug)]
struct NeverRespondsTask;

impl replicoord::core::task::Task for NeverRespondsTask {
    fn kind(&self) -> replicoord::core::task::TaskKind {
        replicoord::core::task::TaskKind::Write
    }

    fn quorum_type(&self) -> QuorumType {
        QuorumType::Write
    }

    fn result_strategy(&self) -> ResultStrategy {
        ResultStrategy::Any
    }

    fn synchronous_timeout(&self, _expected_sync: usize) -> Duration {
        Duration::from_millis(500)
    }

    fn total_timeout(&self, _node_count: usize) -> Duration {
        Duration::from_millis(50)
    }

    fn execute(
        &self,
        _db: &dyn replicoord::core::database::LocalDatabase,
        _origin: replicoord::core::task::ExecutionOrigin,
        _sender: &str,
    ) -> Result<Payload, CoordError> {
        Ok(Payload::Null)
    }
}

/// The absolute total-timeout bound fires even while the synchronous window
/// is still open, when nothing ever responds.
#[tokio::test]
async fn total_timeout_fires_when_nothing_ever_responds() {
    let cluster = support::build(3, |cfg| {
        cfg.write_quorum = 1;
    });
    // deliberately spawn no executors: nobody will ever respond.

    let task: Arc<dyn Task> = Arc::new(NeverRespondsTask);
    let request = write_request(task, &cluster.nodes[0]);
    let err = cluster.dispatcher.send(request).await.unwrap_err();
    assert_eq!(err, CoordError::TotalTimeout);
}

/// P5: UNION ignores the configured quorum and waits for every available
/// node, not just the configured quorum count.
#[tokio::test]
async fn union_expects_every_available_node_regardless_of_quorum() {
    let cluster = support::build(3, |cfg| {
        cfg.write_quorum = 1;
    });
    let _executors = cluster.spawn_executors();
    let _listener = cluster.spawn_response_listener();

    let task: Arc<dyn Task> = Arc::new(RecordTask {
        key: "k".into(),
        value: Payload::from(1),
        quorum_type: QuorumType::None,
        result_strategy: ResultStrategy::Union,
    });
    let request = write_request(task, &cluster.nodes[0]);
    let result = cluster.dispatcher.send(request).await.unwrap();
    let merged = result.as_array().expect("union result is an array");
    assert_eq!(merged.len(), 3);
}
