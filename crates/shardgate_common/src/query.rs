//! Request and result entities exchanged with the gateway.

use serde::{Deserialize, Serialize};

use crate::session::Session;
use crate::types::{ShardId, TabletRole};
use crate::value::{BindVars, Field, Row, Value};

/// SQL text plus its bind variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundQuery {
    pub sql: String,
    pub bind_vars: BindVars,
}

impl BoundQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bind_vars: BindVars::new(),
        }
    }

    pub fn with_bind_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bind_vars.insert(name.into(), value.into());
        self
    }
}

/// A query addressed to an explicit list of shards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryShard {
    pub query: BoundQuery,
    pub keyspace: String,
    pub shards: Vec<ShardId>,
    pub tablet_role: TabletRole,
}

impl QueryShard {
    pub fn new<S: Into<ShardId>>(
        sql: impl Into<String>,
        keyspace: impl Into<String>,
        shards: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            query: BoundQuery::new(sql),
            keyspace: keyspace.into(),
            shards: shards.into_iter().map(Into::into).collect(),
            tablet_role: TabletRole::default(),
        }
    }

    pub fn with_tablet_role(mut self, role: TabletRole) -> Self {
        self.tablet_role = role;
        self
    }

    pub fn with_bind_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query = self.query.with_bind_var(name, value);
        self
    }
}

/// An ordered list of queries, each executed against every listed shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchQueryShard {
    pub queries: Vec<BoundQuery>,
    pub keyspace: String,
    pub shards: Vec<ShardId>,
    pub tablet_role: TabletRole,
}

impl BatchQueryShard {
    pub fn new<S: Into<ShardId>>(
        queries: Vec<BoundQuery>,
        keyspace: impl Into<String>,
        shards: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            queries,
            keyspace: keyspace.into(),
            shards: shards.into_iter().map(Into::into).collect(),
            tablet_role: TabletRole::default(),
        }
    }

    pub fn with_tablet_role(mut self, role: TabletRole) -> Self {
        self.tablet_role = role;
        self
    }
}

/// A query addressed to whatever shards own a key range.
///
/// `key_range` uses the textual `"<hex start>-<hex end>"` form; an empty
/// string targets the whole keyspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRangeQuery {
    pub query: BoundQuery,
    pub keyspace: String,
    pub key_range: String,
    pub tablet_role: TabletRole,
}

impl KeyRangeQuery {
    pub fn new(
        sql: impl Into<String>,
        keyspace: impl Into<String>,
        key_range: impl Into<String>,
    ) -> Self {
        Self {
            query: BoundQuery::new(sql),
            keyspace: keyspace.into(),
            key_range: key_range.into(),
            tablet_role: TabletRole::default(),
        }
    }

    pub fn with_tablet_role(mut self, role: TabletRole) -> Self {
        self.tablet_role = role;
        self
    }

    pub fn with_bind_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query = self.query.with_bind_var(name, value);
        self
    }
}

/// Result of one query, or one streamed chunk of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub fields: Vec<Field>,
    pub rows: Vec<Row>,
    pub rows_affected: u64,
    pub insert_id: u64,
    /// Set only on the response that opened a new backend transaction.
    pub session: Option<Session>,
}

impl QueryResult {
    /// A chunk carrying nothing but an updated session.
    pub fn session_only(session: Session) -> Self {
        Self {
            session: Some(session),
            ..Default::default()
        }
    }

    /// Fold another shard's result for the same query into this one: rows
    /// are concatenated, `rows_affected` summed, the first non-empty field
    /// list and the last non-zero insert id win.
    pub fn append(&mut self, other: QueryResult) {
        if self.fields.is_empty() {
            self.fields = other.fields;
        }
        self.rows.extend(other.rows);
        self.rows_affected += other.rows_affected;
        if other.insert_id != 0 {
            self.insert_id = other.insert_id;
        }
    }
}

/// Results of a batch, one per query index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResultList {
    pub list: Vec<QueryResult>,
    /// Set only when the batch opened at least one new backend transaction.
    pub session: Option<Session>,
}
