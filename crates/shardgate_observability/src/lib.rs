//! Observability setup: structured logging and gateway metric events.
//!
//! Metrics go through the `metrics` facade; installing an exporter is left
//! to whatever process embeds the gateway.

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber with structured logging.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shardgate=debug"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Record one gateway operation (`execute_shard`, `stream_execute_key_range`, ...).
pub fn record_query_metrics(duration_us: u64, operation: &str, success: bool) {
    metrics::counter!(
        "shardgate_queries_total",
        "operation" => operation.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
    metrics::histogram!("shardgate_query_duration_us", "operation" => operation.to_string())
        .record(duration_us as f64);
}

/// Record a session transition: `begin`, `commit`, `rollback`.
pub fn record_txn_metrics(action: &str, success: bool) {
    metrics::counter!(
        "shardgate_txn_total",
        "action" => action.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
}

/// Record how many shards one request fanned out to.
pub fn record_shard_fanout(operation: &str, shard_count: usize) {
    metrics::histogram!("shardgate_shard_fanout", "operation" => operation.to_string())
        .record(shard_count as f64);
}

/// Record a backend transaction opened on first touch of a shard.
pub fn record_shard_txn_opened(keyspace: &str) {
    metrics::counter!("shardgate_shard_txn_opened_total", "keyspace" => keyspace.to_string())
        .increment(1);
}
