use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use shardgate_cluster::routing::{ShardMap, ShardResolver};
use shardgate_cluster::{Gateway, SandboxProvider};
use shardgate_common::config::GatewayConfig;
use shardgate_common::query::KeyRangeQuery;
use shardgate_common::session::Session;
use shardgate_common::types::TabletRole;

#[derive(Parser, Debug)]
#[command(name = "shardgate", about = "Shard gateway: key-range routing and session transactions")]
struct Cli {
    /// Config file path.
    #[arg(short, long, default_value = "shardgate.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the default configuration as TOML and exit.
    PrintDefaultConfig,

    /// Load and validate the config, then print the topology.
    Check,

    /// Print the shards owning a key range (`""` = whole keyspace).
    Resolve { keyspace: String, key_range: String },

    /// Run one statement in a transaction against in-process sandbox shards.
    Sandbox {
        keyspace: String,
        key_range: String,
        sql: String,
        /// Tablet role to target.
        #[arg(long, default_value = "primary", value_parser = parse_tablet_role)]
        role: TabletRole,
        /// Roll back instead of committing.
        #[arg(long)]
        rollback: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::PrintDefaultConfig => {
            println!("{}", GatewayConfig::default().to_toml_string()?);
            Ok(())
        }
        Command::Check => check(&startup(&cli.config)?),
        Command::Resolve {
            keyspace,
            key_range,
        } => resolve(&startup(&cli.config)?, &keyspace, &key_range),
        Command::Sandbox {
            keyspace,
            key_range,
            sql,
            role,
            rollback,
        } => sandbox(&startup(&cli.config)?, keyspace, key_range, sql, role, rollback),
    }
}

/// Tracing plus config, for every command that works against a topology.
fn startup(config_path: &str) -> Result<GatewayConfig> {
    shardgate_observability::init_tracing();
    load_config(config_path)
}

fn parse_tablet_role(s: &str) -> Result<TabletRole, String> {
    s.parse()
}

/// A missing file means defaults; an unreadable or invalid one is an error.
fn load_config(path: &str) -> Result<GatewayConfig> {
    if !Path::new(path).exists() {
        tracing::info!("Config file {} not found, using defaults", path);
        return Ok(GatewayConfig::default());
    }
    let config =
        GatewayConfig::load(path).with_context(|| format!("failed to load config {}", path))?;
    tracing::info!("Loaded config from {}", path);
    Ok(config)
}

fn check(config: &GatewayConfig) -> Result<()> {
    config.validate()?;
    println!("cell: {}", config.gateway.cell);
    for ks in &config.topology.keyspaces {
        println!("keyspace {}:", ks.name);
        for shard in &ks.shards {
            println!("  {:<12} {}", shard.name, shard.key_range()?);
        }
    }
    Ok(())
}

fn resolve(config: &GatewayConfig, keyspace: &str, key_range: &str) -> Result<()> {
    let resolver = ShardResolver::new(Arc::new(ShardMap::from_config(&config.topology)?));
    for shard in resolver.resolve(keyspace, key_range)? {
        println!("{}", shard);
    }
    Ok(())
}

fn sandbox(
    config: &GatewayConfig,
    keyspace: String,
    key_range: String,
    sql: String,
    role: TabletRole,
    rollback: bool,
) -> Result<()> {
    let provider = Arc::new(SandboxProvider::new());
    for ks in &config.topology.keyspaces {
        for shard in &ks.shards {
            provider.map_shard(&ks.name, shard.shard_id());
        }
    }
    let gateway = Gateway::from_config(config, provider.clone())?;

    let mut session = Session::new();
    gateway.begin(&mut session)?;
    let query = KeyRangeQuery::new(sql, keyspace, key_range).with_tablet_role(role);
    let result = match gateway.execute_key_range(&query, Some(&mut session)) {
        Ok(result) => result,
        Err(e) => {
            if let Err(rb) = gateway.rollback(&mut session) {
                tracing::warn!("rollback after failed statement also failed: {}", rb);
            }
            return Err(e.into());
        }
    };

    println!(
        "rows={} rows_affected={} shards_in_txn={}",
        result.rows.len(),
        result.rows_affected,
        session.shard_sessions().len()
    );
    for shard_session in session.shard_sessions() {
        println!(
            "  {}/{} {} ({})",
            shard_session.keyspace,
            shard_session.shard,
            shard_session.transaction_id,
            shard_session.tablet_role
        );
    }

    if rollback {
        gateway.rollback(&mut session)?;
    } else {
        gateway.commit(&mut session)?;
    }
    println!(
        "{} ok, {} backend calls",
        if rollback { "rollback" } else { "commit" },
        provider.journal().len()
    );
    Ok(())
}
