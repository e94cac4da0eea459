use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use logshard_core::{Cell, Dialect, DriverError, ResultSet, ShardConnection, SqlValue, Statement};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::types::BigDecimal;
use sqlx::{PgPool, Postgres, Row};
use tracing::trace;

use crate::decode::result_set;
use crate::dsn::ShardDsn;
use crate::error::{with_timeout, SqlError};
use crate::pool::ShardConnectionOptions;

const LIST_TABLES_SQL: &str =
    "SELECT tablename FROM pg_catalog.pg_tables WHERE schemaname = current_schema()";

/// Shard stored in a Postgres database.
#[derive(Clone)]
pub struct PostgresShard {
    pool: PgPool,
    label: String,
    statement_timeout: Duration,
}

impl fmt::Debug for PostgresShard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresShard")
            .field("label", &self.label)
            .field("statement_timeout", &self.statement_timeout)
            .finish_non_exhaustive()
    }
}

impl PostgresShard {
    /// Opens a pool against `dsn`, failing if no connection is established
    /// within the connect timeout.
    pub async fn connect(dsn: &ShardDsn, options: &ShardConnectionOptions) -> Result<Self, SqlError> {
        let label = dsn.label();
        let pool = tokio::time::timeout(
            options.connect_timeout,
            PgPoolOptions::new()
                .max_connections(options.max_connections)
                .acquire_timeout(options.connect_timeout)
                .connect(dsn.as_str()),
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
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind_params<'q>(statement: &'q Statement) -> Query<'q, Postgres, PgArguments> {
    statement
        .params
        .iter()
        .fold(sqlx::query(&statement.sql), |query, param| match param {
            SqlValue::Text(value) => query.bind(value.as_deref()),
            SqlValue::Integer(value) => query.bind(*value),
            SqlValue::Timestamp(at) => query.bind(*at),
        })
}

/// NUMERIC, which `sum` and `avg` return over BIGINT columns, decoded
/// through its text form.
fn decode_numeric(row: &PgRow, index: usize) -> Option<Cell> {
    row.try_get::<BigDecimal, _>(index)
        .ok()
        .map(|value| Cell::from_text(value.to_string()))
}

#[async_trait]
impl ShardConnection for PostgresShard {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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
        Ok(result_set(&rows, decode_numeric))
    }
}
