//! Collaborator contracts for reaching shard backends.
//!
//! Connection pooling, dialing, retries and timeouts live behind these
//! traits; the gateway only borrows a connection for the duration of one
//! begin/execute/commit/rollback call.

use std::sync::Arc;

use shardgate_common::error::{BackendError, GatewayError, GatewayResult};
use shardgate_common::query::{BoundQuery, QueryResult};
use shardgate_common::types::{ShardId, TabletRole, TxnId};

/// Receiver of streamed chunks. Returning `Err` asks the backend to stop.
pub type ChunkSink<'a> = dyn FnMut(QueryResult) -> Result<(), BackendError> + 'a;

/// A connection to one tablet of one shard.
pub trait ShardConnection: Send + Sync {
    /// Open a backend transaction and return its handle.
    fn begin(&self) -> Result<TxnId, BackendError>;

    /// Execute one statement, inside `txn` when given, autocommit otherwise.
    fn execute(&self, query: &BoundQuery, txn: Option<TxnId>) -> Result<QueryResult, BackendError>;

    /// Execute one statement and hand each produced chunk to `on_chunk`, in
    /// production order.
    fn stream_execute(
        &self,
        query: &BoundQuery,
        txn: Option<TxnId>,
        on_chunk: &mut ChunkSink<'_>,
    ) -> Result<(), BackendError>;

    fn commit(&self, txn: TxnId) -> Result<(), BackendError>;

    fn rollback(&self, txn: TxnId) -> Result<(), BackendError>;
}

/// Hands out connections per (keyspace, shard, tablet role).
pub trait ConnectionProvider: Send + Sync {
    fn get_connection(
        &self,
        keyspace: &str,
        shard: &ShardId,
        role: TabletRole,
    ) -> Result<Arc<dyn ShardConnection>, BackendError>;
}

/// Address of one shard call, used for connecting and for error context.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ShardTarget<'a> {
    pub keyspace: &'a str,
    pub shard: &'a ShardId,
    pub role: TabletRole,
}

impl<'a> ShardTarget<'a> {
    pub fn new(keyspace: &'a str, shard: &'a ShardId, role: TabletRole) -> Self {
        Self {
            keyspace,
            shard,
            role,
        }
    }

    pub fn error(&self, err: BackendError) -> GatewayError {
        GatewayError::from_backend(self.keyspace, self.shard, self.role, err)
    }

    pub fn connect(
        &self,
        provider: &dyn ConnectionProvider,
    ) -> GatewayResult<Arc<dyn ShardConnection>> {
        provider
            .get_connection(self.keyspace, self.shard, self.role)
            .map_err(|e| match e {
                // A provider that cannot hand out a connection means the shard is unreachable.
                BackendError::Execution(reason) => self.error(BackendError::Unavailable(reason)),
                other => self.error(other),
            })
    }
}
