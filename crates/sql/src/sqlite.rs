use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use logshard_core::{Dialect, DriverError, ResultSet, ShardConnection, SqlValue, Statement};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqlitePool};
use tracing::trace;

use crate::decode::result_set;
use crate::dsn::ShardDsn;
use crate::error::{with_timeout, SqlError};
use crate::pool::ShardConnectionOptions;

// `_` is a LIKE wildcard, so the internal prefix is compared literally.
const LIST_TABLES_SQL: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND substr(name, 1, 7) <> 'sqlite_'";

/// Shard stored in a SQLite database file. Timestamps are kept as epoch
/// milliseconds.
#[derive(Clone)]
pub struct SqliteShard {
    pool: SqlitePool,
    label: String,
    statement_timeout: Duration,
}

impl fmt::Debug for SqliteShard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteShard")
            .field("label", &self.label)
            .field("statement_timeout", &self.statement_timeout)
            .finish_non_exhaustive()
    }
}

impl SqliteShard {
    /// Opens (and creates if missing) the database file behind `dsn`.
    pub async fn connect(dsn: &ShardDsn, options: &ShardConnectionOptions) -> Result<Self, SqlError> {
        let label = dsn.label();
        let connect_options = SqliteConnectOptions::from_str(dsn.as_str())
            .map_err(|err| SqlError::connect(label.clone(), err))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(options.statement_timeout);

        let pool = tokio::time::timeout(
            options.connect_timeout,
            SqlitePoolOptions::new()
                .max_connections(options.max_connections)
                .acquire_timeout(options.connect_timeout)
                .connect_with(connect_options),
        )
        .await
        .map_err(|_| SqlError::ConnectTimeout {
            shard: label.clone(),
            seconds: options.connect_timeout.as_secs(),
        })?
        .map_err(|err| SqlError::connect(label.clone(), err))?;

        Ok(Self {
            pool,
            label,
            statement_timeout: options.statement_timeout,
        })
    }

    /// Underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn bind_params<'q>(statement: &'q Statement) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    statement
        .params
        .iter()
        .fold(sqlx::query(&statement.sql), |query, param| match param {
            SqlValue::Text(value) => query.bind(value.as_deref()),
            SqlValue::Integer(value) => query.bind(*value),
            SqlValue::Timestamp(at) => query.bind(at.timestamp_millis()),
        })
}

#[async_trait]
impl ShardConnection for SqliteShard {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn list_tables(&self) -> Result<Vec<String>, DriverError> {
        let rows = with_timeout(
            self.statement_timeout,
            sqlx::query(LIST_TABLES_SQL).fetch_all(&self.pool),
        )
        .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>(0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| DriverError::Database(err.to_string()))
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, DriverError> {
        trace!(shard = %self.label, table = %statement.table, sql = %statement.sql, "execute");
        let done = with_timeout(
            self.statement_timeout,
            bind_params(statement).execute(&self.pool),
        )
        .await?;
        Ok(done.rows_affected())
    }

    async fn fetch_all(&self, sql: &str) -> Result<ResultSet, DriverError> {
        trace!(shard = %self.label, sql, "fetch");
        let rows = with_timeout(self.statement_timeout, sqlx::query(sql).fetch_all(&self.pool)).await?;
        Ok(result_set(&rows, |_, _| None))
    }
}
