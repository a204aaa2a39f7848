//! Shared vocabulary of the gateway: shard/transaction identifiers, key
//! ranges, values, request/result entities, the caller-held session, the
//! error taxonomy, and configuration.

pub mod config;
pub mod error;
pub mod query;
pub mod session;
pub mod types;
pub mod value;

pub use config::GatewayConfig;
pub use error::{BackendError, ErrorKind, GatewayError, GatewayResult};
pub use query::{BatchQueryShard, BoundQuery, KeyRangeQuery, QueryResult, QueryResultList, QueryShard};
pub use session::{Session, ShardSession};
pub use types::{KeyRange, ShardId, TabletRole, TxnId};
pub use value::{BindVars, Field, FieldType, Row, Value};
