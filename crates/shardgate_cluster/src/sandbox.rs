//! In-process sandbox backend for tests and local experiments.
//!
//! `SandboxProvider` hands out one `SandboxConn` per (keyspace, shard). Each
//! connection answers every statement with a fixed single-row result, counts
//! calls, keeps the statements it ran, and can be armed with faults that
//! fire on every matching call until cleared. All calls across the provider
//! land in one shared journal so tests can check cross-shard ordering.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use shardgate_common::error::BackendError;
use shardgate_common::query::{BoundQuery, QueryResult};
use shardgate_common::types::{ShardId, TabletRole, TxnId};
use shardgate_common::value::{Field, FieldType, Value};

use crate::backend::{ChunkSink, ConnectionProvider, ShardConnection};

/// The row every sandbox statement returns: `(id=1, value="foo")`.
pub fn single_row_result() -> QueryResult {
    QueryResult {
        fields: vec![
            Field::new("id", FieldType::Int64),
            Field::new("value", FieldType::Text),
        ],
        rows: vec![vec![Value::Int64(1), Value::from("foo")]],
        rows_affected: 1,
        insert_id: 0,
        session: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxOp {
    Begin,
    Execute,
    Stream,
    Commit,
    Rollback,
}

/// One backend call, as seen by the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub keyspace: String,
    pub shard: ShardId,
    pub op: SandboxOp,
    pub txn: Option<TxnId>,
}

type Journal = Arc<Mutex<Vec<JournalEntry>>>;

#[derive(Default)]
struct Faults {
    begin: Option<BackendError>,
    execute: Option<BackendError>,
    stream: Option<BackendError>,
    commit: Option<BackendError>,
    rollback: Option<BackendError>,
}

impl Faults {
    fn slot(&mut self, op: SandboxOp) -> &mut Option<BackendError> {
        match op {
            SandboxOp::Begin => &mut self.begin,
            SandboxOp::Execute => &mut self.execute,
            SandboxOp::Stream => &mut self.stream,
            SandboxOp::Commit => &mut self.commit,
            SandboxOp::Rollback => &mut self.rollback,
        }
    }
}

/// Sandbox connection to one shard.
pub struct SandboxConn {
    keyspace: String,
    shard: ShardId,
    next_txn: AtomicI64,
    begin_count: AtomicU64,
    exec_count: AtomicU64,
    stream_count: AtomicU64,
    commit_count: AtomicU64,
    rollback_count: AtomicU64,
    faults: Mutex<Faults>,
    /// Chunks produced by `stream_execute`, in order.
    stream_chunks: Mutex<Vec<QueryResult>>,
    executed: Mutex<Vec<(String, Option<TxnId>)>>,
    open_txns: Mutex<BTreeSet<TxnId>>,
    committed: Mutex<Vec<TxnId>>,
    rolled_back: Mutex<Vec<TxnId>>,
    journal: Journal,
}

impl SandboxConn {
    fn new(keyspace: &str, shard: ShardId, journal: Journal) -> Self {
        Self {
            keyspace: keyspace.to_string(),
            shard,
            next_txn: AtomicI64::new(1),
            begin_count: AtomicU64::new(0),
            exec_count: AtomicU64::new(0),
            stream_count: AtomicU64::new(0),
            commit_count: AtomicU64::new(0),
            rollback_count: AtomicU64::new(0),
            faults: Mutex::new(Faults::default()),
            stream_chunks: Mutex::new(vec![single_row_result()]),
            executed: Mutex::new(Vec::new()),
            open_txns: Mutex::new(BTreeSet::new()),
            committed: Mutex::new(Vec::new()),
            rolled_back: Mutex::new(Vec::new()),
            journal,
        }
    }

    pub fn shard(&self) -> &ShardId {
        &self.shard
    }

    // ── Fault injection ──

    pub fn fail_begin(&self, err: BackendError) {
        self.arm(SandboxOp::Begin, err);
    }

    pub fn fail_execute(&self, err: BackendError) {
        self.arm(SandboxOp::Execute, err);
    }

    pub fn fail_stream(&self, err: BackendError) {
        self.arm(SandboxOp::Stream, err);
    }

    pub fn fail_commit(&self, err: BackendError) {
        self.arm(SandboxOp::Commit, err);
    }

    pub fn fail_rollback(&self, err: BackendError) {
        self.arm(SandboxOp::Rollback, err);
    }

    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
    }

    fn arm(&self, op: SandboxOp, err: BackendError) {
        *self.faults.lock().slot(op) = Some(err);
    }

    /// Replace what `stream_execute` produces.
    pub fn set_stream_chunks(&self, chunks: Vec<QueryResult>) {
        *self.stream_chunks.lock() = chunks;
    }

    // ── Inspection ──

    pub fn begin_count(&self) -> u64 {
        self.begin_count.load(Ordering::SeqCst)
    }

    pub fn exec_count(&self) -> u64 {
        self.exec_count.load(Ordering::SeqCst)
    }

    pub fn stream_count(&self) -> u64 {
        self.stream_count.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> u64 {
        self.commit_count.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> u64 {
        self.rollback_count.load(Ordering::SeqCst)
    }

    /// Statements run through `execute` or `stream_execute`, with the
    /// transaction they ran in.
    pub fn executed(&self) -> Vec<(String, Option<TxnId>)> {
        self.executed.lock().clone()
    }

    pub fn committed(&self) -> Vec<TxnId> {
        self.committed.lock().clone()
    }

    pub fn rolled_back(&self) -> Vec<TxnId> {
        self.rolled_back.lock().clone()
    }

    /// Transactions begun and not yet committed or rolled back.
    pub fn open_txns(&self) -> Vec<TxnId> {
        self.open_txns.lock().iter().copied().collect()
    }

    /// Count the call, journal it, then fire the armed fault if any.
    fn enter(
        &self,
        op: SandboxOp,
        counter: &AtomicU64,
        txn: Option<TxnId>,
    ) -> Result<(), BackendError> {
        counter.fetch_add(1, Ordering::SeqCst);
        self.journal.lock().push(JournalEntry {
            keyspace: self.keyspace.clone(),
            shard: self.shard.clone(),
            op,
            txn,
        });
        match self.faults.lock().slot(op).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl ShardConnection for SandboxConn {
    fn begin(&self) -> Result<TxnId, BackendError> {
        self.enter(SandboxOp::Begin, &self.begin_count, None)?;
        let txn = TxnId(self.next_txn.fetch_add(1, Ordering::SeqCst));
        self.open_txns.lock().insert(txn);
        Ok(txn)
    }

    fn execute(&self, query: &BoundQuery, txn: Option<TxnId>) -> Result<QueryResult, BackendError> {
        self.enter(SandboxOp::Execute, &self.exec_count, txn)?;
        self.executed.lock().push((query.sql.clone(), txn));
        Ok(single_row_result())
    }

    fn stream_execute(
        &self,
        query: &BoundQuery,
        txn: Option<TxnId>,
        on_chunk: &mut ChunkSink<'_>,
    ) -> Result<(), BackendError> {
        self.enter(SandboxOp::Stream, &self.stream_count, txn)?;
        self.executed.lock().push((query.sql.clone(), txn));
        let chunks = self.stream_chunks.lock().clone();
        for chunk in chunks {
            on_chunk(chunk)?;
        }
        Ok(())
    }

    fn commit(&self, txn: TxnId) -> Result<(), BackendError> {
        self.enter(SandboxOp::Commit, &self.commit_count, Some(txn))?;
        self.open_txns.lock().remove(&txn);
        self.committed.lock().push(txn);
        Ok(())
    }

    fn rollback(&self, txn: TxnId) -> Result<(), BackendError> {
        self.enter(SandboxOp::Rollback, &self.rollback_count, Some(txn))?;
        self.open_txns.lock().remove(&txn);
        self.rolled_back.lock().push(txn);
        Ok(())
    }
}

/// Connection provider over a registry of sandbox connections.
///
/// Tablet roles share one connection per shard. Unmapped shards are
/// reported as unavailable.
#[derive(Default)]
pub struct SandboxProvider {
    conns: DashMap<(String, ShardId), Arc<SandboxConn>>,
    journal: Journal,
}

impl SandboxProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shard, returning its connection. Mapping an already mapped
    /// shard returns the existing connection.
    pub fn map_shard(&self, keyspace: &str, shard: impl Into<ShardId>) -> Arc<SandboxConn> {
        let shard = shard.into();
        self.conns
            .entry((keyspace.to_string(), shard.clone()))
            .or_insert_with(|| Arc::new(SandboxConn::new(keyspace, shard, self.journal.clone())))
            .clone()
    }

    pub fn unmap_shard(&self, keyspace: &str, shard: &ShardId) -> bool {
        self.conns
            .remove(&(keyspace.to_string(), shard.clone()))
            .is_some()
    }

    pub fn conn(&self, keyspace: &str, shard: &ShardId) -> Option<Arc<SandboxConn>> {
        self.conns
            .get(&(keyspace.to_string(), shard.clone()))
            .map(|c| c.value().clone())
    }

    /// Every backend call across all shards, in call order.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.lock().clone()
    }
}

impl ConnectionProvider for SandboxProvider {
    fn get_connection(
        &self,
        keyspace: &str,
        shard: &ShardId,
        role: TabletRole,
    ) -> Result<Arc<dyn ShardConnection>, BackendError> {
        match self.conn(keyspace, shard) {
            Some(conn) => Ok(conn),
            None => Err(BackendError::Unavailable(format!(
                "no {} tablet for {}/{}",
                role, keyspace, shard
            ))),
        }
    }
}
