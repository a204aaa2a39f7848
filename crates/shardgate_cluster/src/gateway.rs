//! Gateway facade: the operations clients call.
//!
//! Ties the resolver, the shard executor and the transaction coordinator
//! together and records one metric event per operation.

use std::sync::Arc;
use std::time::Instant;

use shardgate_common::config::GatewayConfig;
use shardgate_common::error::{GatewayError, GatewayResult};
use shardgate_common::query::{
    BatchQueryShard, KeyRangeQuery, QueryResult, QueryResultList, QueryShard,
};
use shardgate_common::session::Session;

use crate::backend::ConnectionProvider;
use crate::coordinator::TxnCoordinator;
use crate::executor::ShardExecutor;
use crate::routing::{ShardMap, ShardResolver, Topology};

/// Run `f` and record its latency and outcome under `operation`.
fn observe<T>(operation: &str, f: impl FnOnce() -> GatewayResult<T>) -> GatewayResult<T> {
    let start = Instant::now();
    let res = f();
    shardgate_observability::record_query_metrics(
        start.elapsed().as_micros() as u64,
        operation,
        res.is_ok(),
    );
    res
}

pub struct Gateway {
    cell: String,
    resolver: ShardResolver,
    executor: ShardExecutor,
    coordinator: TxnCoordinator,
}

impl Gateway {
    pub fn new(topology: Arc<dyn Topology>, provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            cell: "local".to_string(),
            resolver: ShardResolver::new(topology),
            executor: ShardExecutor::new(provider.clone()),
            coordinator: TxnCoordinator::new(provider),
        }
    }

    /// Build a gateway over the configured static topology.
    pub fn from_config(
        config: &GatewayConfig,
        provider: Arc<dyn ConnectionProvider>,
    ) -> GatewayResult<Self> {
        config.validate()?;
        let topology = ShardMap::from_config(&config.topology)?;
        let gateway = Self::new(Arc::new(topology), provider)
            .with_cell(&config.gateway.cell)
            .with_max_scatter_parallelism(config.gateway.max_scatter_parallelism);
        tracing::info!(
            cell = %gateway.cell,
            keyspaces = config.topology.keyspaces.len(),
            max_scatter_parallelism = config.gateway.max_scatter_parallelism,
            "gateway configured"
        );
        Ok(gateway)
    }

    pub fn with_cell(mut self, cell: impl Into<String>) -> Self {
        self.cell = cell.into();
        self
    }

    pub fn with_max_scatter_parallelism(mut self, max: usize) -> Self {
        self.executor = self.executor.with_max_parallelism(max);
        self
    }

    // ── Execution ──

    /// Execute one query on the listed shards and merge the results.
    ///
    /// `result.session` is set only when this call opened a backend
    /// transaction on at least one shard.
    pub fn execute_shard(
        &self,
        query: &QueryShard,
        session: Option<&mut Session>,
    ) -> GatewayResult<QueryResult> {
        observe("execute_shard", || {
            shardgate_observability::record_shard_fanout("execute_shard", query.shards.len());
            self.execute_one(query, session)
        })
    }

    /// Resolve the key range, then execute like `execute_shard`.
    pub fn execute_key_range(
        &self,
        query: &KeyRangeQuery,
        session: Option<&mut Session>,
    ) -> GatewayResult<QueryResult> {
        observe("execute_key_range", || {
            let shards = self.resolver.resolve(&query.keyspace, &query.key_range)?;
            shardgate_observability::record_shard_fanout("execute_key_range", shards.len());
            let query = QueryShard {
                query: query.query.clone(),
                keyspace: query.keyspace.clone(),
                shards,
                tablet_role: query.tablet_role,
            };
            self.execute_one(&query, session)
        })
    }

    /// Execute every query of the batch on every listed shard.
    pub fn execute_batch_shard(
        &self,
        batch: &BatchQueryShard,
        session: Option<&mut Session>,
    ) -> GatewayResult<QueryResultList> {
        observe("execute_batch_shard", || {
            shardgate_observability::record_shard_fanout("execute_batch_shard", batch.shards.len());
            self.executor.execute_batch(
                &batch.keyspace,
                &batch.shards,
                batch.tablet_role,
                &batch.queries,
                session,
            )
        })
    }

    fn execute_one(
        &self,
        query: &QueryShard,
        session: Option<&mut Session>,
    ) -> GatewayResult<QueryResult> {
        let list = self.executor.execute_batch(
            &query.keyspace,
            &query.shards,
            query.tablet_role,
            std::slice::from_ref(&query.query),
            session,
        )?;
        let mut result = list.list.into_iter().next().ok_or_else(|| {
            GatewayError::Internal("batch of one query returned no result".into())
        })?;
        result.session = list.session;
        Ok(result)
    }

    // ── Streaming ──

    /// Stream one query from a single listed shard.
    pub fn stream_execute_shard<F>(
        &self,
        query: &QueryShard,
        session: Option<&mut Session>,
        on_chunk: F,
    ) -> GatewayResult<()>
    where
        F: FnMut(QueryResult) -> GatewayResult<()>,
    {
        observe("stream_execute_shard", || {
            self.executor.stream_execute(
                &query.keyspace,
                &query.shards,
                query.tablet_role,
                &query.query,
                session,
                on_chunk,
            )
        })
    }

    /// Stream one query from the single shard owning the key range.
    pub fn stream_execute_key_range<F>(
        &self,
        query: &KeyRangeQuery,
        session: Option<&mut Session>,
        on_chunk: F,
    ) -> GatewayResult<()>
    where
        F: FnMut(QueryResult) -> GatewayResult<()>,
    {
        observe("stream_execute_key_range", || {
            let shards = self.resolver.resolve(&query.keyspace, &query.key_range)?;
            self.executor.stream_execute(
                &query.keyspace,
                &shards,
                query.tablet_role,
                &query.query,
                session,
                on_chunk,
            )
        })
    }

    // ── Transactions ──

    pub fn begin(&self, session: &mut Session) -> GatewayResult<()> {
        let res = self.coordinator.begin(session);
        shardgate_observability::record_txn_metrics("begin", res.is_ok());
        res
    }

    /// Commit every shard transaction in the session, best-effort.
    pub fn commit(&self, session: &mut Session) -> GatewayResult<()> {
        let res = self.coordinator.commit(session);
        shardgate_observability::record_txn_metrics("commit", res.is_ok());
        res
    }

    pub fn rollback(&self, session: &mut Session) -> GatewayResult<()> {
        let res = self.coordinator.rollback(session);
        shardgate_observability::record_txn_metrics("rollback", res.is_ok());
        res
    }
}
