#![allow(dead_code, unused_imports)]

pub use std::sync::Arc;

pub use shardgate_cluster::sandbox::{single_row_result, SandboxConn, SandboxOp, SandboxProvider};
pub use shardgate_cluster::{Gateway, ShardInfo, ShardMap};
pub use shardgate_common::error::{BackendError, GatewayError};
pub use shardgate_common::query::{BatchQueryShard, BoundQuery, KeyRangeQuery, QueryShard};
pub use shardgate_common::session::Session;
pub use shardgate_common::types::{KeyRange, ShardId, TabletRole, TxnId};

pub const KEYSPACE: &str = "test_keyspace";
pub const UNSHARDED: &str = "test_unsharded";

pub const SHARDS: [&str; 8] = [
    "-20", "20-40", "40-60", "60-80", "80-a0", "a0-c0", "c0-e0", "e0-",
];

/// A gateway over eight sharded ranges plus one unsharded keyspace, every
/// shard backed by a sandbox connection.
pub fn setup() -> (Gateway, Arc<SandboxProvider>) {
    let map = ShardMap::new();
    map.set_keyspace(
        KEYSPACE,
        SHARDS
            .iter()
            .map(|name| ShardInfo::new(*name, KeyRange::parse(name).unwrap()))
            .collect(),
    );
    map.set_keyspace(UNSHARDED, vec![ShardInfo::new("0", KeyRange::full())]);

    let provider = Arc::new(SandboxProvider::new());
    for name in SHARDS {
        provider.map_shard(KEYSPACE, name);
    }
    provider.map_shard(UNSHARDED, "0");

    let gateway = Gateway::new(Arc::new(map), provider.clone());
    (gateway, provider)
}

pub fn conn(provider: &SandboxProvider, keyspace: &str, shard: &str) -> Arc<SandboxConn> {
    provider.conn(keyspace, &ShardId::from(shard)).unwrap()
}

pub fn in_txn() -> Session {
    let mut session = Session::new();
    session.begin().unwrap();
    session
}
