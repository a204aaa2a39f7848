use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{GatewayError, GatewayResult};

/// Name of a shard within a keyspace (e.g. `"0"`, `"-20"`, `"20-40"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId(pub String);

impl ShardId {
    pub fn new(name: impl Into<String>) -> Self {
        ShardId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ShardId {
    fn from(name: &str) -> Self {
        ShardId(name.to_string())
    }
}

impl From<String> for ShardId {
    fn from(name: String) -> Self {
        ShardId(name)
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend transaction handle. Opaque to the gateway; only the connection
/// that issued it can interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxnId(pub i64);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Functional role of the tablet a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabletRole {
    /// Read-write primary.
    #[default]
    Primary,
    /// Serving read replica.
    Replica,
    /// Batch / analytics read-only replica.
    Rdonly,
}

impl fmt::Display for TabletRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabletRole::Primary => write!(f, "primary"),
            TabletRole::Replica => write!(f, "replica"),
            TabletRole::Rdonly => write!(f, "rdonly"),
        }
    }
}

impl FromStr for TabletRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" | "master" => Ok(TabletRole::Primary),
            "replica" => Ok(TabletRole::Replica),
            "rdonly" | "readonly" => Ok(TabletRole::Rdonly),
            _ => Err(format!(
                "Invalid tablet role '{}': expected primary, replica, or rdonly",
                s
            )),
        }
    }
}

/// Half-open span `[start, end)` of the partitioning key space.
///
/// Bounds are raw key bytes written as hex in the textual form
/// `"<start>-<end>"`. An empty start is the keyspace minimum, an empty end
/// the keyspace maximum, so `""` and `"-"` both denote the whole keyspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyRange {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl KeyRange {
    /// The whole keyspace.
    pub fn full() -> Self {
        KeyRange::default()
    }

    pub fn new(start: Vec<u8>, end: Vec<u8>) -> Self {
        KeyRange { start, end }
    }

    /// Parse the `"<hex start>-<hex end>"` form.
    pub fn parse(text: &str) -> GatewayResult<KeyRange> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "-" {
            return Ok(KeyRange::full());
        }
        let (start, end) = trimmed
            .split_once('-')
            .ok_or_else(|| GatewayError::invalid_key_range(text, "expected <start>-<end>"))?;
        let start = hex::decode(start)
            .map_err(|e| GatewayError::invalid_key_range(text, format!("start bound: {}", e)))?;
        let end = hex::decode(end)
            .map_err(|e| GatewayError::invalid_key_range(text, format!("end bound: {}", e)))?;
        if !end.is_empty() && start >= end {
            return Err(GatewayError::invalid_key_range(
                text,
                "start must sort before end",
            ));
        }
        Ok(KeyRange { start, end })
    }

    pub fn is_full(&self) -> bool {
        self.start.is_empty() && self.end.is_empty()
    }

    /// True when the two ranges share at least one key.
    pub fn intersects(&self, other: &KeyRange) -> bool {
        starts_before(&self.start, &other.end) && starts_before(&other.start, &self.end)
    }

    /// True when `key` falls inside this range.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.start.as_slice() <= key && starts_before(key, &self.end)
    }
}

/// `start < end`, where an empty `end` is unbounded.
fn starts_before(start: &[u8], end: &[u8]) -> bool {
    end.is_empty() || start < end
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", hex::encode(&self.start), hex::encode(&self.end))
    }
}

impl FromStr for KeyRange {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyRange::parse(s)
    }
}
