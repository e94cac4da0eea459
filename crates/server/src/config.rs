//! Command line and environment configuration.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use logshard_sql::{expand_shards, ShardConnectionOptions, ShardDsn, ShardDsnError, ShardEngine};

/// CLI arguments for the server. Every flag falls back to an environment
/// variable.
#[derive(Parser, Debug, Clone)]
#[command(name = "logshard")]
#[command(about = "Sharded log ingestion and query service")]
pub struct CliArgs {
    /// Shard database engine (postgres or sqlite)
    #[arg(long, default_value = "postgres", env = "LOGSHARD_ENGINE")]
    pub engine: ShardEngine,

    /// Database user
    #[arg(long, default_value = "dbuser", env = "LOGSHARD_DB_USERNAME")]
    pub db_username: String,

    /// Database password
    #[arg(long, default_value = "dbpassword", env = "LOGSHARD_DB_PASSWORD", hide_env_values = true)]
    pub db_password: String,

    /// Comma separated database addresses (directories for sqlite)
    #[arg(
        long,
        default_value = "localhost:5432",
        env = "LOGSHARD_DB_ADDRESSES",
        value_delimiter = ','
    )]
    pub db_addresses: Vec<String>,

    /// Comma separated database names; every address hosts each of them
    #[arg(
        long,
        default_value = "databalancer,databalancer2",
        env = "LOGSHARD_DB_NAMES",
        value_delimiter = ','
    )]
    pub db_names: Vec<String>,

    /// Address the HTTP server listens on
    #[arg(long, default_value = "0.0.0.0:8080", env = "LOGSHARD_SERVER_ADDRESS")]
    pub server_address: SocketAddr,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, env = "LOGSHARD_DEBUG")]
    pub debug: bool,

    /// Run the background retention sweep
    #[arg(short, long, env = "LOGSHARD_PURGE")]
    pub purge: bool,

    /// Age in days beyond which the sweep deletes rows
    #[arg(long, default_value = "7", env = "LOGSHARD_RETENTION_DAYS")]
    pub retention_days: u64,

    /// Seconds between retention sweeps
    #[arg(long, default_value = "86400", env = "LOGSHARD_PURGE_INTERVAL_SECS")]
    pub purge_interval_secs: u64,

    /// Timeout for every database statement
    #[arg(long, default_value = "30", env = "LOGSHARD_STATEMENT_TIMEOUT_SECS")]
    pub statement_timeout_secs: u64,

    /// Pooled connections per shard
    #[arg(long, default_value = "5", env = "LOGSHARD_MAX_CONNECTIONS")]
    pub max_connections: u32,
}

impl CliArgs {
    /// Connection strings for every address and database name pair.
    pub fn shard_dsns(&self) -> Result<Vec<ShardDsn>, ShardDsnError> {
        expand_shards(
            self.engine,
            &self.db_addresses,
            &self.db_names,
            &self.db_username,
            &self.db_password,
        )
    }

    pub fn connection_options(&self) -> ShardConnectionOptions {
        ShardConnectionOptions {
            max_connections: self.max_connections.max(1),
            statement_timeout: Duration::from_secs(self.statement_timeout_secs.max(1)),
            ..ShardConnectionOptions::default()
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(24 * 60 * 60))
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs.max(1))
    }

    /// Default tracing directive when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}
