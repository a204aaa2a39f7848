//! Shard gateway core: key-range routing, shard execution with lazily
//! opened per-shard transactions, and best-effort commit/rollback.
//!
//! Callers own the `Session`; every operation that can change it takes it
//! by `&mut`. The gateway itself keeps no per-session state.

pub mod backend;
pub mod coordinator;
pub mod executor;
pub mod gateway;
pub mod routing;
pub mod sandbox;

pub use backend::{ChunkSink, ConnectionProvider, ShardConnection};
pub use coordinator::{TxnCoordinator, TxnResolution};
pub use executor::ShardExecutor;
pub use gateway::Gateway;
pub use routing::{ShardInfo, ShardMap, ShardResolver, Topology};
pub use sandbox::{SandboxConn, SandboxProvider};
