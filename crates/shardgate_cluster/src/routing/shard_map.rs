use std::collections::BTreeMap;

use parking_lot::RwLock;

use shardgate_common::config::TopologyConfig;
use shardgate_common::error::{GatewayError, GatewayResult};
use shardgate_common::types::{KeyRange, ShardId};

use super::Topology;

/// Information about a single shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardInfo {
    pub id: ShardId,
    /// The key range this shard owns: [start, end).
    pub key_range: KeyRange,
}

impl ShardInfo {
    pub fn new(id: impl Into<ShardId>, key_range: KeyRange) -> Self {
        Self {
            id: id.into(),
            key_range,
        }
    }
}

/// In-memory topology: keyspace name → shards sorted by range start.
///
/// Keyspaces can be replaced while the gateway is serving; readers see
/// either the old or the new shard list, never a mix.
#[derive(Debug, Default)]
pub struct ShardMap {
    keyspaces: RwLock<BTreeMap<String, Vec<ShardInfo>>>,
}

impl ShardMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[topology]` config section.
    pub fn from_config(config: &TopologyConfig) -> GatewayResult<Self> {
        let map = Self::new();
        for ks in &config.keyspaces {
            let shards = ks
                .shards
                .iter()
                .map(|s| Ok(ShardInfo::new(s.shard_id(), s.key_range()?)))
                .collect::<GatewayResult<Vec<_>>>()?;
            map.set_keyspace(&ks.name, shards);
        }
        Ok(map)
    }

    /// Install or replace the shard list of a keyspace.
    pub fn set_keyspace(&self, keyspace: &str, mut shards: Vec<ShardInfo>) {
        shards.sort_by(|a, b| a.key_range.start.cmp(&b.key_range.start));
        tracing::info!(
            keyspace,
            shards = ?shards.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            "ShardMap: keyspace updated"
        );
        self.keyspaces.write().insert(keyspace.to_string(), shards);
    }

    /// Remove a keyspace. Returns true if it existed.
    pub fn remove_keyspace(&self, keyspace: &str) -> bool {
        self.keyspaces.write().remove(keyspace).is_some()
    }

    /// Snapshot of a keyspace's shards.
    pub fn shards(&self, keyspace: &str) -> Option<Vec<ShardInfo>> {
        self.keyspaces.read().get(keyspace).cloned()
    }

    pub fn keyspace_names(&self) -> Vec<String> {
        self.keyspaces.read().keys().cloned().collect()
    }
}

impl Topology for ShardMap {
    fn shards_for_key_range(
        &self,
        keyspace: &str,
        key_range: &KeyRange,
    ) -> GatewayResult<Vec<ShardId>> {
        let keyspaces = self.keyspaces.read();
        let shards = keyspaces
            .get(keyspace)
            .ok_or_else(|| GatewayError::Topology(format!("unknown keyspace '{}'", keyspace)))?;
        Ok(shards
            .iter()
            .filter(|s| s.key_range.intersects(key_range))
            .map(|s| s.id.clone())
            .collect())
    }
}
