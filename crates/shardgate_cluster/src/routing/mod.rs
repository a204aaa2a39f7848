//! Key-range routing: the topology contract, the in-memory shard map that
//! implements it, and the resolver the execution paths call.

pub mod resolver;
pub mod shard_map;

pub use resolver::ShardResolver;
pub use shard_map::{ShardInfo, ShardMap};

use shardgate_common::error::GatewayResult;
use shardgate_common::types::{KeyRange, ShardId};

/// Source of truth for which shards own which key ranges.
pub trait Topology: Send + Sync {
    /// Shards of `keyspace` whose range intersects `key_range`, ordered by
    /// range start.
    fn shards_for_key_range(
        &self,
        keyspace: &str,
        key_range: &KeyRange,
    ) -> GatewayResult<Vec<ShardId>>;
}
