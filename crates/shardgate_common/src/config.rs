use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};
use crate::types::{KeyRange, ShardId};

/// Top-level gateway configuration (`shardgate.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub topology: TopologyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySection {
    /// Cell (failure domain) this gateway serves.
    pub cell: String,
    /// Upper bound on concurrent per-shard workers for one fan-out
    /// (0 = one worker per target shard).
    #[serde(default)]
    pub max_scatter_parallelism: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            cell: "local".into(),
            max_scatter_parallelism: 0,
        }
    }
}

/// Static shard layout served by the in-memory topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub keyspaces: Vec<KeyspaceConfig>,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            keyspaces: vec![KeyspaceConfig {
                name: "main".into(),
                shards: vec![ShardConfig {
                    name: "0".into(),
                    key_range: None,
                }],
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyspaceConfig {
    pub name: String,
    pub shards: Vec<ShardConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardConfig {
    pub name: String,
    /// Hex key range owned by the shard. When omitted, a name containing
    /// `-` (e.g. `"20-40"`) doubles as the range and any other name
    /// (e.g. `"0"`) owns the whole keyspace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_range: Option<String>,
}

impl ShardConfig {
    pub fn shard_id(&self) -> ShardId {
        ShardId::new(self.name.clone())
    }

    pub fn key_range(&self) -> GatewayResult<KeyRange> {
        match &self.key_range {
            Some(range) => KeyRange::parse(range),
            None if self.name.contains('-') => KeyRange::parse(&self.name),
            None => Ok(KeyRange::full()),
        }
    }
}

impl GatewayConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> GatewayResult<Self> {
        let config: GatewayConfig =
            toml::from_str(content).map_err(|e| GatewayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> GatewayResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> GatewayResult<String> {
        toml::to_string_pretty(self).map_err(|e| GatewayError::Config(e.to_string()))
    }

    /// Reject layouts the resolver cannot serve: duplicate keyspaces, empty
    /// keyspaces, duplicate shard names, malformed or overlapping ranges.
    pub fn validate(&self) -> GatewayResult<()> {
        let mut keyspaces = HashSet::new();
        for ks in &self.topology.keyspaces {
            if !keyspaces.insert(ks.name.as_str()) {
                return Err(GatewayError::Config(format!(
                    "keyspace '{}' declared twice",
                    ks.name
                )));
            }
            if ks.shards.is_empty() {
                return Err(GatewayError::Config(format!(
                    "keyspace '{}' has no shards",
                    ks.name
                )));
            }

            let mut names = HashSet::new();
            let mut ranges = Vec::with_capacity(ks.shards.len());
            for shard in &ks.shards {
                if !names.insert(shard.name.as_str()) {
                    return Err(GatewayError::Config(format!(
                        "shard '{}' declared twice in keyspace '{}'",
                        shard.name, ks.name
                    )));
                }
                let range = shard.key_range().map_err(|e| {
                    GatewayError::Config(format!("keyspace '{}': {}", ks.name, e))
                })?;
                ranges.push((range, shard.name.as_str()));
            }

            ranges.sort_by(|a, b| a.0.start.cmp(&b.0.start));
            for pair in ranges.windows(2) {
                if pair[0].0.intersects(&pair[1].0) {
                    return Err(GatewayError::Config(format!(
                        "keyspace '{}': shards '{}' and '{}' overlap",
                        ks.name, pair[0].1, pair[1].1
                    )));
                }
            }
        }
        Ok(())
    }
}
