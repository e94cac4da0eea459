//! Mock implementations of traits for testing.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::DriverError;
use crate::result::ResultSet;
use crate::shard::ShardConnection;
use crate::statement::{Dialect, SqlValue, Statement};

#[derive(Debug, Default)]
struct MockState {
    tables: BTreeMap<String, Vec<Vec<SqlValue>>>,
    executed: Vec<Statement>,
    queries: Vec<String>,
    fail_list_tables: bool,
    fail_writes: Option<(String, usize)>,
    fail_queries: bool,
    query_result: ResultSet,
}

/// In-memory shard connection.
///
/// Understands the statements the engine renders: `CREATE TABLE` adds a
/// table, `INSERT` appends the bound parameters as a row and `DELETE` drops
/// rows whose ingestion timestamp is before the bound cutoff.
#[derive(Debug)]
pub struct MockShardConnection {
    dialect: Dialect,
    state: Mutex<MockState>,
}

impl Default for MockShardConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl MockShardConnection {
    /// Create an empty Postgres-flavored connection.
    pub fn new() -> Self {
        Self::with_dialect(Dialect::Postgres)
    }

    /// Create an empty connection speaking `dialect`.
    pub fn with_dialect(dialect: Dialect) -> Self {
        MockShardConnection {
            dialect,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Create a connection whose database already holds `tables`.
    pub fn with_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        {
            let mut state = mock.state.lock().unwrap();
            for table in tables {
                state.tables.entry(table.into()).or_default();
            }
        }
        mock
    }

    /// Whether the table exists.
    pub fn has_table(&self, table: &str) -> bool {
        self.state.lock().unwrap().tables.contains_key(table)
    }

    /// Remove a table behind the engine's back.
    pub fn drop_table(&self, table: &str) {
        self.state.lock().unwrap().tables.remove(table);
    }

    /// Every statement passed to `execute`, in order.
    pub fn executed(&self) -> Vec<Statement> {
        self.state.lock().unwrap().executed.clone()
    }

    /// Rows stored in `table`.
    pub fn rows(&self, table: &str) -> Vec<Vec<SqlValue>> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of rows stored in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map_or(0, Vec::len)
    }

    /// Insert a row directly, bypassing the engine.
    pub fn push_row(&self, table: &str, row: Vec<SqlValue>) {
        self.state
            .lock()
            .unwrap()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Every query passed to `fetch_all`, in order.
    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    /// Make `list_tables` fail until switched back.
    pub fn fail_list_tables(&self, fail: bool) {
        self.state.lock().unwrap().fail_list_tables = fail;
    }

    /// Let `successes` writes (inserts or deletes) to `table` through, then
    /// fail every following one.
    pub fn fail_writes_to(&self, table: &str, successes: usize) {
        self.state.lock().unwrap().fail_writes = Some((table.to_string(), successes));
    }

    /// Make `fetch_all` fail.
    pub fn fail_queries(&self, fail: bool) {
        self.state.lock().unwrap().fail_queries = fail;
    }

    /// Result returned by every `fetch_all`.
    pub fn set_query_result(&self, result: ResultSet) {
        self.state.lock().unwrap().query_result = result;
    }
}

fn row_timestamp(row: &[SqlValue]) -> Option<chrono::DateTime<chrono::Utc>> {
    row.iter().rev().find_map(|value| match value {
        SqlValue::Timestamp(at) => Some(*at),
        _ => None,
    })
}

#[async_trait]
impl ShardConnection for MockShardConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn list_tables(&self) -> Result<Vec<String>, DriverError> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        if state.fail_list_tables {
            return Err(DriverError::database("connection refused"));
        }
        Ok(state.tables.keys().cloned().collect())
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, DriverError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        state.executed.push(statement.clone());

        if statement.sql.starts_with("CREATE TABLE") {
            state.tables.entry(statement.table.clone()).or_default();
            return Ok(0);
        }
        if statement.sql.starts_with("CREATE INDEX") {
            return Ok(0);
        }

        if let Some((table, remaining)) = state.fail_writes.as_mut() {
            if *table == statement.table {
                if *remaining == 0 {
                    return Err(DriverError::database("disk full"));
                }
                *remaining -= 1;
            }
        }

        let rows = state.tables.get_mut(&statement.table).ok_or_else(|| {
            DriverError::database(format!("relation \"{}\" does not exist", statement.table))
        })?;

        if statement.sql.starts_with("INSERT") {
            rows.push(statement.params.clone());
            Ok(1)
        } else if statement.sql.starts_with("DELETE") {
            let cutoff = row_timestamp(&statement.params)
                .ok_or_else(|| DriverError::database("missing cutoff parameter"))?;
            let before = rows.len();
            rows.retain(|row| row_timestamp(row).map_or(true, |at| at >= cutoff));
            Ok((before - rows.len()) as u64)
        } else {
            Err(DriverError::Unsupported(statement.sql.clone()))
        }
    }

    async fn fetch_all(&self, sql: &str) -> Result<ResultSet, DriverError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        state.queries.push(sql.to_string());
        if state.fail_queries {
            return Err(DriverError::database("query canceled"));
        }
        Ok(state.query_result.clone())
    }
}
