// src/core/metrics.rs

//! Prometheus metrics for the dispatcher, executor and recovery coordinator.
//!
//! Registered once globally via `lazy_static`, for the lifetime of the process.

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Gauge, GaugeVec, HistogramVec, Opts, TextEncoder, register_counter_vec,
    register_gauge, register_gauge_vec, register_histogram_vec,
};

lazy_static! {
    pub static ref DISPATCH_TOTAL: CounterVec = register_counter_vec!(
        Opts::new(
            "coord_dispatch_total",
            "Outbound dispatches, labeled by database and outcome."
        ),
        &["database", "outcome"]
    )
    .unwrap();
    pub static ref QUORUM_DOWNGRADES_TOTAL: CounterVec = register_counter_vec!(
        Opts::new(
            "coord_quorum_downgrades_total",
            "Quorum downgrades to available node count, by database."
        ),
        &["database"]
    )
    .unwrap();
    pub static ref UNDO_RECORDS_ACTIVE: GaugeVec = register_gauge_vec!(
        Opts::new(
            "coord_undo_records_active",
            "Undo records currently held, by database."
        ),
        &["database"]
    )
    .unwrap();
    pub static ref EXECUTOR_PROCESSED_TOTAL: CounterVec = register_counter_vec!(
        Opts::new(
            "coord_executor_processed_total",
            "Requests applied by the inbound executor, by database."
        ),
        &["database"]
    )
    .unwrap();
    pub static ref EXECUTOR_SKIPPED_TOTAL: CounterVec = register_counter_vec!(
        Opts::new(
            "coord_executor_skipped_total",
            "Requests skipped by the inbound executor (task-type gating), by database."
        ),
        &["database"]
    )
    .unwrap();
    pub static ref DISPATCH_LATENCY_SECONDS: HistogramVec = register_histogram_vec!(
        "coord_dispatch_latency_seconds",
        "Time from broadcast unlock to aggregated response, by database.",
        &["database"]
    )
    .unwrap();
    pub static ref ONLINE_DATABASES: Gauge = register_gauge!(
        "coord_online_databases",
        "Number of databases whose inbound executor is online."
    )
    .unwrap();
    pub static ref RESYNC_TOTAL: CounterVec = register_counter_vec!(
        Opts::new(
            "coord_resync_total",
            "Periodic resync rounds, labeled by database and outcome."
        ),
        &["database", "outcome"]
    )
    .unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
