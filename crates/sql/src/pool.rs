use std::sync::Arc;
use std::time::Duration;

use logshard_core::{Shard, ShardConnection};
use tracing::{info, warn};

use crate::dsn::{ShardDsn, ShardEngine};
use crate::error::SqlError;
use crate::postgres::PostgresShard;
use crate::sqlite::SqliteShard;

/// Connection tuning knobs shared by every shard.
#[derive(Debug, Clone)]
pub struct ShardConnectionOptions {
    /// Maximum number of pooled connections per shard.
    pub max_connections: u32,
    /// Timeout applied when establishing each shard's pool.
    pub connect_timeout: Duration,
    /// Timeout applied to every statement and query.
    pub statement_timeout: Duration,
}

impl Default for ShardConnectionOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            connect_timeout: Duration::from_secs(5),
            statement_timeout: Duration::from_secs(30),
        }
    }
}

/// Connects one shard with the driver matching its engine.
pub async fn connect(
    dsn: &ShardDsn,
    options: &ShardConnectionOptions,
) -> Result<Arc<dyn ShardConnection>, SqlError> {
    let connection: Arc<dyn ShardConnection> = match dsn.engine() {
        ShardEngine::Postgres => Arc::new(PostgresShard::connect(dsn, options).await?),
        ShardEngine::Sqlite => Arc::new(SqliteShard::connect(dsn, options).await?),
    };
    Ok(connection)
}

/// Connects every configured shard in order. Shards that fail are logged
/// and left out; ids follow the order of the connected shards.
pub async fn connect_shards(dsns: &[ShardDsn], options: &ShardConnectionOptions) -> Vec<Shard> {
    let mut shards = Vec::with_capacity(dsns.len());
    for dsn in dsns {
        match connect(dsn, options).await {
            Ok(connection) => {
                info!(shard = %dsn.label(), "connected shard");
                shards.push(Shard::new(shards.len(), dsn.label(), connection));
            }
            Err(err) => warn!(shard = %dsn.label(), error = %err, "skipping unreachable shard"),
        }
    }
    shards
}
