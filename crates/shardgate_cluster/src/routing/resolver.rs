//! Key range → shard list resolution on top of a `Topology`.

use std::sync::Arc;

use shardgate_common::error::GatewayResult;
use shardgate_common::types::{KeyRange, ShardId};

use super::Topology;

pub struct ShardResolver {
    topology: Arc<dyn Topology>,
}

impl ShardResolver {
    pub fn new(topology: Arc<dyn Topology>) -> Self {
        Self { topology }
    }

    /// Shards currently owning `key_range` (the whole keyspace when full).
    pub fn resolve_key_range(
        &self,
        keyspace: &str,
        key_range: &KeyRange,
    ) -> GatewayResult<Vec<ShardId>> {
        let shards = self.topology.shards_for_key_range(keyspace, key_range)?;
        tracing::debug!(
            keyspace,
            key_range = %key_range,
            shards = ?shards,
            "resolved key range"
        );
        Ok(shards)
    }

    /// Parse the textual `"<start>-<end>"` form, then resolve.
    pub fn resolve(&self, keyspace: &str, key_range: &str) -> GatewayResult<Vec<ShardId>> {
        let range = KeyRange::parse(key_range)?;
        self.resolve_key_range(keyspace, &range)
    }
}
