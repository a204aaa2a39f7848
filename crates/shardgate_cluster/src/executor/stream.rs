//! Single-shard streaming.

use shardgate_common::error::{BackendError, GatewayError, GatewayResult};
use shardgate_common::query::{BoundQuery, QueryResult};
use shardgate_common::session::Session;
use shardgate_common::types::{ShardId, TabletRole};

use super::query::TxnPlan;
use super::{dedup_shards, session_notice, ShardExecutor};
use crate::backend::ShardTarget;

impl ShardExecutor {
    /// Stream `query` from exactly one shard, handing each chunk to
    /// `on_chunk` in backend order.
    ///
    /// Multi-shard targets are rejected before any callback. When this call
    /// opened the shard's transaction, one extra session-only chunk follows
    /// the data chunks. An error returned by `on_chunk` stops the stream and
    /// is returned unchanged.
    pub fn stream_execute<F>(
        &self,
        keyspace: &str,
        shards: &[ShardId],
        role: TabletRole,
        query: &BoundQuery,
        mut session: Option<&mut Session>,
        mut on_chunk: F,
    ) -> GatewayResult<()>
    where
        F: FnMut(QueryResult) -> GatewayResult<()>,
    {
        let shards = dedup_shards(shards);
        if shards.len() > 1 {
            return Err(GatewayError::UnsupportedMultiShardStream {
                keyspace: keyspace.to_string(),
                shards,
            });
        }
        let Some(shard) = shards.first() else {
            return Err(GatewayError::NoTargetShards {
                keyspace: keyspace.to_string(),
            });
        };

        let target = ShardTarget::new(keyspace, shard, role);
        let plan = TxnPlan::for_target(session.as_deref(), &target)?;
        let conn = target.connect(self.provider())?;
        let txn = plan.start(conn.as_ref(), &target)?;

        // Recorded before streaming so a failed stream leaves it for rollback.
        let opened = plan == TxnPlan::Open;
        if let (Some(txn), Some(session)) = (txn.filter(|_| opened), session.as_deref_mut()) {
            session.record_shard_txn(keyspace, shard, role, txn)?;
        }

        let mut callback_err: Option<GatewayError> = None;
        let mut chunks = 0usize;
        let streamed = conn.stream_execute(query, txn, &mut |chunk: QueryResult| {
            chunks += 1;
            on_chunk(chunk).map_err(|e| {
                callback_err = Some(e);
                BackendError::Aborted
            })
        });

        if let Some(e) = callback_err {
            tracing::debug!(keyspace, shard = %shard, error = %e, "stream stopped by callback");
            return Err(e);
        }
        streamed.map_err(|e| {
            tracing::warn!(keyspace, shard = %shard, error = %e, "shard stream failed");
            target.error(e)
        })?;

        tracing::debug!(keyspace, shard = %shard, chunks, "shard stream finished");

        if let Some(notice) = session_notice(session.as_deref(), opened) {
            on_chunk(QueryResult::session_only(notice))?;
        }
        Ok(())
    }
}
