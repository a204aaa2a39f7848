//! Caller-held transaction session.
//!
//! A `Session` travels with every request of a multi-shard transaction. The
//! gateway mutates it in place and keeps no copy of its own:
//!
//! - `begin` sets `in_transaction`;
//! - `record_shard_txn` appends one `ShardSession` per shard on first touch;
//! - `close` clears both fields on commit/rollback.
//!
//! Invariant: `in_transaction == false` implies no shard sessions.

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};
use crate::types::{ShardId, TabletRole, TxnId};

/// One open backend transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSession {
    pub keyspace: String,
    pub shard: ShardId,
    pub transaction_id: TxnId,
    pub tablet_role: TabletRole,
}

impl ShardSession {
    pub fn new(
        keyspace: impl Into<String>,
        shard: impl Into<ShardId>,
        transaction_id: TxnId,
        tablet_role: TabletRole,
    ) -> Self {
        Self {
            keyspace: keyspace.into(),
            shard: shard.into(),
            transaction_id,
            tablet_role,
        }
    }

    fn is_for(&self, keyspace: &str, shard: &ShardId) -> bool {
        self.keyspace == keyspace && &self.shard == shard
    }
}

/// Transaction state threaded through a sequence of gateway calls.
///
/// Deserialization rejects shard sessions outside a transaction and
/// repeated shards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SessionWire")]
pub struct Session {
    in_transaction: bool,
    /// First-touch order; at most one entry per (keyspace, shard).
    shard_sessions: Vec<ShardSession>,
}

#[derive(Deserialize)]
struct SessionWire {
    in_transaction: bool,
    #[serde(default)]
    shard_sessions: Vec<ShardSession>,
}

impl TryFrom<SessionWire> for Session {
    type Error = GatewayError;

    fn try_from(wire: SessionWire) -> GatewayResult<Self> {
        if !wire.in_transaction && !wire.shard_sessions.is_empty() {
            return Err(GatewayError::InvalidSession(format!(
                "{} shard sessions outside a transaction",
                wire.shard_sessions.len()
            )));
        }
        for (i, s) in wire.shard_sessions.iter().enumerate() {
            if wire.shard_sessions[..i].iter().any(|p| p.is_for(&s.keyspace, &s.shard)) {
                return Err(GatewayError::InvalidSession(format!(
                    "shard {}/{} appears twice",
                    s.keyspace, s.shard
                )));
            }
        }
        Ok(Session {
            in_transaction: wire.in_transaction,
            shard_sessions: wire.shard_sessions,
        })
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Open shard transactions in first-touch order.
    pub fn shard_sessions(&self) -> &[ShardSession] {
        &self.shard_sessions
    }

    pub fn find(&self, keyspace: &str, shard: &ShardId) -> Option<&ShardSession> {
        self.shard_sessions.iter().find(|s| s.is_for(keyspace, shard))
    }

    /// Mark the session as inside a transaction. Changes `in_transaction` only.
    pub fn begin(&mut self) -> GatewayResult<()> {
        if self.in_transaction {
            return Err(GatewayError::AlreadyInTransaction);
        }
        self.in_transaction = true;
        Ok(())
    }

    /// Transaction to reuse for `shard`, if one is open.
    ///
    /// Fails when the shard's transaction was opened under another tablet
    /// role: a shard keeps one backend transaction for the whole session.
    pub fn txn_for(
        &self,
        keyspace: &str,
        shard: &ShardId,
        role: TabletRole,
    ) -> GatewayResult<Option<TxnId>> {
        match self.find(keyspace, shard) {
            None => Ok(None),
            Some(existing) if existing.tablet_role != role => {
                Err(GatewayError::TabletRoleMismatch {
                    keyspace: keyspace.to_string(),
                    shard: shard.clone(),
                    opened: existing.tablet_role,
                    requested: role,
                })
            }
            Some(existing) => Ok(Some(existing.transaction_id)),
        }
    }

    /// Record a newly opened backend transaction. Appends to
    /// `shard_sessions` unless the shard is already present, in which case
    /// the existing entry is returned unchanged.
    pub fn record_shard_txn(
        &mut self,
        keyspace: &str,
        shard: &ShardId,
        role: TabletRole,
        transaction_id: TxnId,
    ) -> GatewayResult<&ShardSession> {
        if !self.in_transaction {
            return Err(GatewayError::NotInTransaction);
        }
        let idx = match self.shard_sessions.iter().position(|s| s.is_for(keyspace, shard)) {
            Some(idx) => idx,
            None => {
                self.shard_sessions
                    .push(ShardSession::new(keyspace, shard.clone(), transaction_id, role));
                self.shard_sessions.len() - 1
            }
        };
        Ok(&self.shard_sessions[idx])
    }

    /// End the transaction: clears `in_transaction` and hands back the shard
    /// sessions that still need a commit or rollback.
    pub fn close(&mut self) -> Vec<ShardSession> {
        self.in_transaction = false;
        std::mem::take(&mut self.shard_sessions)
    }
}
