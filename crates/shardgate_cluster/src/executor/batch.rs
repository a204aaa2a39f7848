//! Batch fan-out: N queries × M shards, merged by query index.

use shardgate_common::error::{GatewayError, GatewayResult};
use shardgate_common::query::{BoundQuery, QueryResult, QueryResultList};
use shardgate_common::session::Session;
use shardgate_common::types::{ShardId, TabletRole};

use super::query::{execute_on_shard, TxnPlan};
use super::{dedup_shards, session_notice, ShardExecutor, ShardOutcome};
use crate::backend::ShardTarget;

impl ShardExecutor {
    /// Execute every query on every shard and merge per query.
    ///
    /// Shards run in parallel on scoped threads, at most `max_parallelism`
    /// at a time. Any shard failure fails the whole batch: no further wave
    /// is started and the earliest failing shard in target order wins.
    /// Newly opened shard transactions are recorded in target order.
    pub fn execute_batch(
        &self,
        keyspace: &str,
        shards: &[ShardId],
        role: TabletRole,
        queries: &[BoundQuery],
        mut session: Option<&mut Session>,
    ) -> GatewayResult<QueryResultList> {
        let shards = dedup_shards(shards);
        let plans = shards
            .iter()
            .map(|shard| {
                TxnPlan::for_target(session.as_deref(), &ShardTarget::new(keyspace, shard, role))
            })
            .collect::<GatewayResult<Vec<_>>>()?;

        let outcomes = self.scatter(keyspace, &shards, &plans, role, queries);

        let mut merged: Vec<QueryResult> = vec![QueryResult::default(); queries.len()];
        let mut opened = false;
        let mut first_err: Option<GatewayError> = None;
        for (shard, outcome) in shards.iter().zip(outcomes) {
            if let (Some(txn), Some(session)) = (outcome.opened, session.as_deref_mut()) {
                session.record_shard_txn(keyspace, shard, role, txn)?;
                opened = true;
            }
            match outcome.results {
                Ok(results) if first_err.is_none() => {
                    for (slot, result) in merged.iter_mut().zip(results) {
                        slot.append(result);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(keyspace, shard = %shard, error = %e, "batch failed on shard");
                    first_err.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_err {
            return Err(e);
        }
        Ok(QueryResultList {
            list: merged,
            session: session_notice(session.as_deref(), opened),
        })
    }

    /// Outcomes in shard order. Stops after the first wave with a failure,
    /// so the list may be shorter than `shards`.
    fn scatter(
        &self,
        keyspace: &str,
        shards: &[ShardId],
        plans: &[TxnPlan],
        role: TabletRole,
        queries: &[BoundQuery],
    ) -> Vec<ShardOutcome> {
        let provider = self.provider();
        let run = |shard: &ShardId, plan: TxnPlan| {
            let target = ShardTarget::new(keyspace, shard, role);
            execute_on_shard(provider, &target, plan, queries)
        };

        if shards.len() <= 1 {
            return shards.iter().zip(plans).map(|(s, p)| run(s, *p)).collect();
        }

        let wave = match self.max_parallelism {
            0 => shards.len(),
            n => n,
        };

        let mut outcomes = Vec::with_capacity(shards.len());
        for (chunk, chunk_plans) in shards.chunks(wave).zip(plans.chunks(wave)) {
            let results: Vec<ShardOutcome> = std::thread::scope(|s| {
                let handles: Vec<_> = chunk
                    .iter()
                    .zip(chunk_plans)
                    .map(|(shard, plan)| {
                        let run = &run;
                        let plan = *plan;
                        s.spawn(move || run(shard, plan))
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|h| {
                        h.join().unwrap_or_else(|_| ShardOutcome {
                            results: Err(GatewayError::Internal(
                                "shard worker panicked during batch execution".into(),
                            )),
                            opened: None,
                        })
                    })
                    .collect()
            });
            let failed = results.iter().any(|o| o.results.is_err());
            outcomes.extend(results);
            if failed {
                tracing::debug!(
                    keyspace,
                    skipped = shards.len() - outcomes.len(),
                    "batch wave failed, remaining shards not started"
                );
                break;
            }
        }
        outcomes
    }
}
