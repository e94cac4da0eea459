//! logshard-sql
//!
//! sqlx-backed shard connections (Postgres, SQLite) and shard pool bootstrap.

#![warn(missing_docs)]

mod decode;
/// Shard connection strings built from credentials, addresses and names.
pub mod dsn;
mod error;
/// Postgres-backed shard connection.
pub mod postgres;
/// Connecting a configured set of shards.
pub mod pool;
/// SQLite-backed shard connection.
pub mod sqlite;

pub use dsn::{expand_shards, ShardDsn, ShardDsnError, ShardEngine};
pub use error::SqlError;
pub use pool::{connect, connect_shards, ShardConnectionOptions};
pub use postgres::PostgresShard;
pub use sqlite::SqliteShard;
