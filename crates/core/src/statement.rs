//! Parameterized statements handed to shard drivers.
//!
//! Caller-supplied values only ever travel in [`Statement::params`]; the
//! statement text contains validated, quoted identifiers and placeholders.

use chrono::{DateTime, Utc};

use crate::family::{quote_identifier, FamilyName, RAW_LOG_TABLE};

/// SQL flavor spoken by a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL (`$1` placeholders, `TIMESTAMPTZ`).
    Postgres,
    /// SQLite (`?` placeholders, epoch-millisecond timestamps).
    Sqlite,
}

impl Dialect {
    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::Sqlite => "?".to_string(),
        }
    }

    pub(crate) fn primary_key(self) -> &'static str {
        match self {
            Dialect::Postgres => "id BIGSERIAL PRIMARY KEY",
            Dialect::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }

    pub(crate) fn integer_type(self) -> &'static str {
        match self {
            Dialect::Postgres => "BIGINT",
            Dialect::Sqlite => "INTEGER",
        }
    }

    pub(crate) fn timestamp_type(self) -> &'static str {
        match self {
            Dialect::Postgres => "TIMESTAMPTZ",
            Dialect::Sqlite => "INTEGER",
        }
    }
}

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Text column value; `None` is SQL NULL.
    Text(Option<String>),
    /// Integer column value; `None` is SQL NULL.
    Integer(Option<i64>),
    /// Ingestion or cutoff timestamp.
    Timestamp(DateTime<Utc>),
}

/// Statement text plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Statement text with dialect placeholders.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<SqlValue>,
    /// Table the statement addresses.
    pub table: String,
}

impl Statement {
    fn new(sql: String, params: Vec<SqlValue>, table: impl Into<String>) -> Self {
        Self {
            sql,
            params,
            table: table.into(),
        }
    }

    /// `CREATE TABLE IF NOT EXISTS raw_logs (...)` for the shared audit table.
    pub fn create_raw_log_table(dialect: Dialect) -> Self {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({}, family VARCHAR(255) NOT NULL, log TEXT NOT NULL, ingested_at {} NOT NULL)",
            RAW_LOG_TABLE,
            dialect.primary_key(),
            dialect.timestamp_type(),
        );
        Self::new(sql, Vec::new(), RAW_LOG_TABLE)
    }

    /// Insert one audit record.
    pub fn insert_raw_log(
        dialect: Dialect,
        family: &FamilyName,
        log: String,
        ingested_at: DateTime<Utc>,
    ) -> Self {
        let sql = format!(
            "INSERT INTO {} (family, log, ingested_at) VALUES ({}, {}, {})",
            RAW_LOG_TABLE,
            dialect.placeholder(1),
            dialect.placeholder(2),
            dialect.placeholder(3),
        );
        let params = vec![
            SqlValue::Text(Some(family.to_string())),
            SqlValue::Text(Some(log)),
            SqlValue::Timestamp(ingested_at),
        ];
        Self::new(sql, params, RAW_LOG_TABLE)
    }

    /// Insert one typed row. `columns` and `values` are parallel; the
    /// ingestion timestamp is appended as the last parameter.
    pub fn insert_row(
        dialect: Dialect,
        family: &FamilyName,
        columns: &[&str],
        values: Vec<SqlValue>,
        ingested_at: DateTime<Utc>,
    ) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        let mut names: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
        names.push("ingested_at".to_string());
        let placeholders: Vec<String> = (1..=names.len())
            .map(|index| dialect.placeholder(index))
            .collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            family.quoted(),
            names.join(", "),
            placeholders.join(", "),
        );
        let mut params = values;
        params.push(SqlValue::Timestamp(ingested_at));
        Self::new(sql, params, family.as_str())
    }

    /// Delete rows of `table` ingested strictly before `cutoff`.
    ///
    /// `table` must be a valid identifier; callers pass family names or the
    /// audit table.
    pub fn delete_before(dialect: Dialect, table: &str, cutoff: DateTime<Utc>) -> Self {
        let sql = format!(
            "DELETE FROM {} WHERE ingested_at < {}",
            quote_identifier(table),
            dialect.placeholder(1),
        );
        Self::new(sql, vec![SqlValue::Timestamp(cutoff)], table)
    }
}
