//! Best-effort transaction coordinator.
//!
//! Commit and rollback walk the session's shard transactions in the order
//! they were opened. There is no prepare phase: a failure on one shard does
//! not stop the others, so a commit may land on some shards and not others.
//! The first failure is reported and the session is cleared either way.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use shardgate_common::error::{GatewayError, GatewayResult};
use shardgate_common::session::{Session, ShardSession};

use crate::backend::{ConnectionProvider, ShardTarget};

/// How an open transaction is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnResolution {
    Commit,
    Rollback,
}

impl fmt::Display for TxnResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxnResolution::Commit => write!(f, "commit"),
            TxnResolution::Rollback => write!(f, "rollback"),
        }
    }
}

pub struct TxnCoordinator {
    provider: Arc<dyn ConnectionProvider>,
}

impl TxnCoordinator {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self { provider }
    }

    /// Mark the session as in a transaction. No backend call is made;
    /// shard transactions open lazily on first touch.
    pub fn begin(&self, session: &mut Session) -> GatewayResult<()> {
        session.begin()
    }

    pub fn commit(&self, session: &mut Session) -> GatewayResult<()> {
        self.finish(session, TxnResolution::Commit)
    }

    pub fn rollback(&self, session: &mut Session) -> GatewayResult<()> {
        self.finish(session, TxnResolution::Rollback)
    }

    fn finish(&self, session: &mut Session, resolution: TxnResolution) -> GatewayResult<()> {
        if !session.in_transaction() {
            return Err(GatewayError::NotInTransaction);
        }
        let start = Instant::now();
        let shard_sessions = session.close();
        let total = shard_sessions.len();

        let mut first_err: Option<GatewayError> = None;
        let mut failed = 0usize;
        for shard_session in &shard_sessions {
            if let Err(e) = self.finish_shard(shard_session, resolution) {
                tracing::warn!(
                    keyspace = %shard_session.keyspace,
                    shard = %shard_session.shard,
                    txn = %shard_session.transaction_id,
                    error = %e,
                    "{} failed on shard",
                    resolution
                );
                failed += 1;
                first_err.get_or_insert(e);
            }
        }

        tracing::info!(
            %resolution,
            shards = total,
            failed,
            latency_us = start.elapsed().as_micros() as u64,
            "transaction finished"
        );

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn finish_shard(
        &self,
        shard_session: &ShardSession,
        resolution: TxnResolution,
    ) -> GatewayResult<()> {
        let target = ShardTarget::new(
            &shard_session.keyspace,
            &shard_session.shard,
            shard_session.tablet_role,
        );
        let conn = target.connect(self.provider.as_ref())?;
        let txn = shard_session.transaction_id;
        let res = match resolution {
            TxnResolution::Commit => conn.commit(txn),
            TxnResolution::Rollback => conn.rollback(txn),
        };
        res.map_err(|e| target.error(e))
    }
}
