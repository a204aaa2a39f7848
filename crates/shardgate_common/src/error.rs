use thiserror::Error;

use crate::types::{ShardId, TabletRole};

/// Convenience alias for `Result<T, GatewayError>`.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Error classification for retry/escalation decisions.
///
/// - `UserError`: protocol misuse or bad input (begin twice, bad key range)
/// - `Retryable`: the shard rejected the work; the client SHOULD retry
/// - `Transient`: the shard could not be reached; the client MAY retry after back-off
/// - `InternalBug`: should never happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UserError,
    Retryable,
    Transient,
    InternalBug,
}

/// Failure reported by a backend collaborator (connection provider or
/// shard connection). Carries no shard context; the gateway adds it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The shard could not be reached or refused the connection.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The shard was reached but the statement or transaction call failed.
    #[error("{0}")]
    Execution(String),

    /// A streaming receiver asked the backend to stop producing chunks.
    #[error("stream aborted by receiver")]
    Aborted,
}

/// Top-level error type returned by every gateway operation.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("session is already in a transaction")]
    AlreadyInTransaction,

    #[error("session is not in a transaction")]
    NotInTransaction,

    #[error("streaming is not supported across multiple shards: {keyspace} resolved to {shards:?}")]
    UnsupportedMultiShardStream {
        keyspace: String,
        shards: Vec<ShardId>,
    },

    #[error("no shards targeted in keyspace {keyspace}")]
    NoTargetShards { keyspace: String },

    #[error("shard {keyspace}/{shard} ({role}) unavailable: {reason}")]
    BackendUnavailable {
        keyspace: String,
        shard: ShardId,
        role: TabletRole,
        reason: String,
    },

    #[error("shard {keyspace}/{shard} ({role}) execution failed: {reason}")]
    BackendExecution {
        keyspace: String,
        shard: ShardId,
        role: TabletRole,
        reason: String,
    },

    /// A streaming callback refused a chunk.
    #[error("stream callback aborted: {0}")]
    CallbackAborted(String),

    #[error("shard {keyspace}/{shard} has an open {opened} transaction, request targets {requested}")]
    TabletRoleMismatch {
        keyspace: String,
        shard: ShardId,
        opened: TabletRole,
        requested: TabletRole,
    },

    #[error("invalid key range {range:?}: {reason}")]
    InvalidKeyRange { range: String, reason: String },

    #[error("invalid session: {0}")]
    InvalidSession(String),

    #[error("Topology error: {0}")]
    Topology(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Attach shard context to a collaborator failure.
    pub fn from_backend(
        keyspace: &str,
        shard: &ShardId,
        role: TabletRole,
        err: BackendError,
    ) -> Self {
        match err {
            BackendError::Unavailable(reason) => GatewayError::BackendUnavailable {
                keyspace: keyspace.to_string(),
                shard: shard.clone(),
                role,
                reason,
            },
            BackendError::Execution(reason) => GatewayError::BackendExecution {
                keyspace: keyspace.to_string(),
                shard: shard.clone(),
                role,
                reason,
            },
            BackendError::Aborted => GatewayError::CallbackAborted(format!(
                "backend stream on {}/{} stopped by receiver",
                keyspace, shard
            )),
        }
    }

    pub fn invalid_key_range(range: impl Into<String>, reason: impl Into<String>) -> Self {
        GatewayError::InvalidKeyRange {
            range: range.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error for retry/escalation decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::AlreadyInTransaction => ErrorKind::UserError,
            GatewayError::NotInTransaction => ErrorKind::UserError,
            GatewayError::UnsupportedMultiShardStream { .. } => ErrorKind::UserError,
            GatewayError::NoTargetShards { .. } => ErrorKind::UserError,
            GatewayError::TabletRoleMismatch { .. } => ErrorKind::UserError,
            GatewayError::InvalidKeyRange { .. } => ErrorKind::UserError,
            GatewayError::CallbackAborted(_) => ErrorKind::UserError,
            GatewayError::InvalidSession(_) => ErrorKind::UserError,
            GatewayError::Config(_) => ErrorKind::UserError,

            GatewayError::BackendExecution { .. } => ErrorKind::Retryable,

            GatewayError::BackendUnavailable { .. } => ErrorKind::Transient,
            GatewayError::Topology(_) => ErrorKind::Transient,

            GatewayError::Internal(_) => ErrorKind::InternalBug,
        }
    }

    /// Returns true if the client should retry this operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Retryable)
    }

    /// Returns true if this is a user/input error.
    pub fn is_user_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::UserError)
    }

    /// Returns true if this is a transient reachability error.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }

    /// Shard the error originated from, when there is one.
    pub fn shard(&self) -> Option<&ShardId> {
        match self {
            GatewayError::BackendUnavailable { shard, .. }
            | GatewayError::BackendExecution { shard, .. }
            | GatewayError::TabletRoleMismatch { shard, .. } => Some(shard),
            _ => None,
        }
    }
}
