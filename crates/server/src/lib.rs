//! logshard-server
//!
//! HTTP front end wiring the engine to a configured shard pool.

pub mod config;
mod error;
pub mod handlers;
pub mod http;

use std::sync::Arc;

use anyhow::{Context, Result};
use logshard_core::{RetentionPurger, ShardRegistry};
use logshard_sql::connect_shards;
use tracing::info;

pub use config::CliArgs;
pub use error::ApiError;
pub use handlers::AppState;

/// Connects the configured shards, prepares them and serves until shutdown.
pub async fn run(args: CliArgs) -> Result<()> {
    let dsns = args.shard_dsns().context("invalid shard configuration")?;
    info!(engine = %args.engine, shards = dsns.len(), "connecting shards");

    let shards = connect_shards(&dsns, &args.connection_options()).await;
    let registry = Arc::new(ShardRegistry::new(shards).context("cannot start without shards")?);
    registry.prepare().await;

    let purger = RetentionPurger::new(registry.clone())
        .with_retention(args.retention())
        .with_interval(args.purge_interval());
    let state = AppState::new(registry, purger);

    let sweeper = if args.purge {
        info!(
            retention_days = args.retention_days,
            interval_secs = args.purge_interval_secs,
            "retention sweep enabled"
        );
        Some(state.purger.clone().spawn())
    } else {
        None
    };

    let served = http::serve(state, args.server_address).await;
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    served
}
