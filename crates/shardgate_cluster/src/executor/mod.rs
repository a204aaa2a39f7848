//! Shard execution: per-shard query runs, batch fan-out and streaming.
//!
//! Every path plans its shard transactions with `query::TxnPlan` against the
//! session up front, runs the shard calls without touching the session, and
//! records newly opened transactions afterwards in target order. Whether a
//! call opened one is turned into a session notification by
//! `session_notice`, shared by the batch and stream paths.

mod batch;
mod query;
mod stream;

use std::sync::Arc;

use shardgate_common::error::GatewayResult;
use shardgate_common::query::QueryResult;
use shardgate_common::session::Session;
use shardgate_common::types::{ShardId, TxnId};

use crate::backend::ConnectionProvider;

/// Runs queries against shards through a `ConnectionProvider`.
pub struct ShardExecutor {
    provider: Arc<dyn ConnectionProvider>,
    /// Upper bound on concurrently running shard workers; 0 = no bound.
    max_parallelism: usize,
}

impl ShardExecutor {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            max_parallelism: 0,
        }
    }

    pub fn with_max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism;
        self
    }

    pub(crate) fn provider(&self) -> &dyn ConnectionProvider {
        self.provider.as_ref()
    }
}

/// What one shard produced for a batch.
#[derive(Debug)]
pub(crate) struct ShardOutcome {
    pub results: GatewayResult<Vec<QueryResult>>,
    /// Transaction this call opened on the shard, still to be recorded.
    pub opened: Option<TxnId>,
}

/// Drop repeated shard names, keeping first occurrence.
pub(crate) fn dedup_shards(shards: &[ShardId]) -> Vec<ShardId> {
    let mut out: Vec<ShardId> = Vec::with_capacity(shards.len());
    for shard in shards {
        if !out.contains(shard) {
            out.push(shard.clone());
        }
    }
    out
}

/// Session payload to hand back to the caller: a snapshot of the session,
/// only when the call newly opened a backend transaction.
pub(crate) fn session_notice(session: Option<&Session>, opened: bool) -> Option<Session> {
    match session {
        Some(session) if opened => Some(session.clone()),
        _ => None,
    }
}
