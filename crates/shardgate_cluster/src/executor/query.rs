//! Single-shard execution with lazy transaction begin.

use shardgate_common::error::GatewayResult;
use shardgate_common::query::{BoundQuery, QueryResult};
use shardgate_common::session::Session;
use shardgate_common::types::TxnId;

use super::ShardOutcome;
use crate::backend::{ConnectionProvider, ShardConnection, ShardTarget};

/// Which transaction a shard call runs in, decided from the session before
/// any backend call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxnPlan {
    Autocommit,
    /// Run in a transaction an earlier call opened.
    Reuse(TxnId),
    /// First touch inside a transaction: begin one on the shard.
    Open,
}

impl TxnPlan {
    /// Fails on a tablet-role mismatch with the shard's open transaction.
    pub fn for_target(session: Option<&Session>, target: &ShardTarget<'_>) -> GatewayResult<Self> {
        let Some(session) = session.filter(|s| s.in_transaction()) else {
            return Ok(TxnPlan::Autocommit);
        };
        Ok(match session.txn_for(target.keyspace, target.shard, target.role)? {
            Some(txn) => TxnPlan::Reuse(txn),
            None => TxnPlan::Open,
        })
    }

    /// The transaction to run statements in, beginning one if planned.
    pub fn start(
        self,
        conn: &dyn ShardConnection,
        target: &ShardTarget<'_>,
    ) -> GatewayResult<Option<TxnId>> {
        match self {
            TxnPlan::Autocommit => Ok(None),
            TxnPlan::Reuse(txn) => Ok(Some(txn)),
            TxnPlan::Open => {
                let txn = conn.begin().map_err(|e| target.error(e))?;
                tracing::debug!(
                    keyspace = target.keyspace,
                    shard = %target.shard,
                    txn = %txn,
                    "opened shard transaction"
                );
                shardgate_observability::record_shard_txn_opened(target.keyspace);
                Ok(Some(txn))
            }
        }
    }
}

/// Run `queries` in order on one shard. Stops at the first failure.
///
/// Never touches the session: a transaction this call opened comes back in
/// `opened`, even when a later statement failed, for the caller to record.
pub(crate) fn execute_on_shard(
    provider: &dyn ConnectionProvider,
    target: &ShardTarget<'_>,
    plan: TxnPlan,
    queries: &[BoundQuery],
) -> ShardOutcome {
    let mut opened = None;
    let results = run_on_shard(provider, target, plan, queries, &mut opened);
    ShardOutcome { results, opened }
}

fn run_on_shard(
    provider: &dyn ConnectionProvider,
    target: &ShardTarget<'_>,
    plan: TxnPlan,
    queries: &[BoundQuery],
    opened: &mut Option<TxnId>,
) -> GatewayResult<Vec<QueryResult>> {
    let conn = target.connect(provider)?;
    let txn = plan.start(conn.as_ref(), target)?;
    if plan == TxnPlan::Open {
        *opened = txn;
    }

    let mut results: Vec<QueryResult> = Vec::with_capacity(queries.len());
    for query in queries {
        let result = conn.execute(query, txn).map_err(|e| {
            tracing::warn!(
                keyspace = target.keyspace,
                shard = %target.shard,
                error = %e,
                "shard query failed"
            );
            target.error(e)
        })?;
        results.push(result);
    }

    tracing::debug!(
        keyspace = target.keyspace,
        shard = %target.shard,
        queries = queries.len(),
        in_txn = txn.is_some(),
        "shard queries executed"
    );
    Ok(results)
}
