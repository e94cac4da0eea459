//! Declared schemas and the table definitions synthesized from them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::family::{is_valid_identifier, quote_identifier, FamilyName};
use crate::shard::Shard;
use crate::statement::{Dialect, Statement};

/// Column names every family table carries besides the declared fields.
pub const RESERVED_COLUMNS: [&str; 2] = ["id", "ingested_at"];

/// Primitive types a schema may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Bounded text, `VARCHAR(255)`.
    String,
    /// 64-bit integer.
    Int,
}

impl ColumnType {
    /// Declared name as it appears in requests.
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Int => "int",
        }
    }

    fn sql_type(self, dialect: Dialect) -> &'static str {
        match self {
            ColumnType::String => "VARCHAR(255)",
            ColumnType::Int => dialect.integer_type(),
        }
    }
}

impl FromStr for ColumnType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "string" => Ok(ColumnType::String),
            "int" => Ok(ColumnType::Int),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field name to declared type, validated. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    fields: BTreeMap<String, ColumnType>,
}

impl SchemaDescriptor {
    /// Validates a caller-supplied `field -> type` map for `family`.
    pub fn parse(family: &FamilyName, raw: &BTreeMap<String, String>) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::invalid_schema(family.as_str(), "no fields declared"));
        }
        let mut fields = BTreeMap::new();
        for (field, declared) in raw {
            let column_type = declared
                .parse::<ColumnType>()
                .map_err(|_| Error::unsupported_type(family.as_str(), field, declared))?;
            if !is_valid_identifier(field) {
                return Err(Error::invalid_schema(
                    family.as_str(),
                    format!("'{}' is not a valid column name", field),
                ));
            }
            if RESERVED_COLUMNS.contains(&field.as_str()) {
                return Err(Error::invalid_schema(
                    family.as_str(),
                    format!("'{}' is a reserved column", field),
                ));
            }
            debug!(
                family = %family,
                field = %field,
                column_type = %column_type,
                "declared field"
            );
            fields.insert(field.clone(), column_type);
        }
        Ok(Self { fields })
    }

    /// Declared type of `field`, if any.
    pub fn column_type(&self, field: &str) -> Option<ColumnType> {
        self.fields.get(field).copied()
    }

    /// Fields in column order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.fields.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no field is declared. Never the case for a parsed schema.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Physical table for a family: `id`, one column per field, `ingested_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    /// Table name, equal to the family name.
    pub family: FamilyName,
    /// Declared columns in order.
    pub columns: Vec<(String, ColumnType)>,
}

impl TableDefinition {
    /// Renders the DDL for `dialect`: the table itself, then the
    /// `ingested_at` index used by purges.
    pub fn create_statements(&self, dialect: Dialect) -> Vec<Statement> {
        let mut parts = vec![dialect.primary_key().to_string()];
        for (name, column_type) in &self.columns {
            parts.push(format!(
                "{} {}",
                quote_identifier(name),
                column_type.sql_type(dialect)
            ));
        }
        parts.push(format!("ingested_at {} NOT NULL", dialect.timestamp_type()));

        let create = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.family.quoted(),
            parts.join(", ")
        );
        let index = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} (ingested_at)",
            quote_identifier(&format!("{}_ingested_at_idx", self.family)),
            self.family.quoted()
        );
        vec![
            Statement {
                sql: create,
                params: Vec::new(),
                table: self.family.to_string(),
            },
            Statement {
                sql: index,
                params: Vec::new(),
                table: self.family.to_string(),
            },
        ]
    }
}

/// Derives table definitions and issues them against a shard.
pub struct SchemaBuilder;

impl SchemaBuilder {
    /// Table definition for `family` under `schema`.
    pub fn table_definition(family: &FamilyName, schema: &SchemaDescriptor) -> TableDefinition {
        TableDefinition {
            family: family.clone(),
            columns: schema
                .fields()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
        }
    }

    /// Creates the family table on `shard`. Safe to repeat: every statement
    /// is conditional, so a table created concurrently elsewhere is kept.
    pub async fn create_table(
        shard: &Shard,
        family: &FamilyName,
        schema: &SchemaDescriptor,
    ) -> Result<()> {
        let definition = Self::table_definition(family, schema);
        let connection = shard.connection();
        for statement in definition.create_statements(connection.dialect()) {
            connection
                .execute(&statement)
                .await
                .map_err(|source| Error::storage("create table", family.as_str(), source))?;
        }
        info!(
            family = %family,
            shard = %shard.label(),
            columns = definition.columns.len(),
            "created family table"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family() -> FamilyName {
        FamilyName::parse("auth").unwrap()
    }

    fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_supported_types() {
        let schema =
            SchemaDescriptor::parse(&family(), &raw(&[("user", "string"), ("port", "int")]))
                .unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.column_type("user"), Some(ColumnType::String));
        assert_eq!(schema.column_type("port"), Some(ColumnType::Int));
        assert_eq!(schema.column_type("missing"), None);
    }

    #[test]
    fn rejects_unsupported_type() {
        let err = SchemaDescriptor::parse(&family(), &raw(&[("ok", "bool")])).unwrap_err();
        match err {
            Error::UnsupportedType {
                field, declared, ..
            } => {
                assert_eq!(field, "ok");
                assert_eq!(declared, "bool");
            }
            other => panic!("Expected UnsupportedType, got {other:?}"),
        }
    }

    #[test]
    fn rejects_reserved_and_invalid_columns() {
        assert!(matches!(
            SchemaDescriptor::parse(&family(), &raw(&[("id", "int")])),
            Err(Error::InvalidSchema { .. })
        ));
        assert!(matches!(
            SchemaDescriptor::parse(&family(), &raw(&[("ingested_at", "int")])),
            Err(Error::InvalidSchema { .. })
        ));
        assert!(matches!(
            SchemaDescriptor::parse(&family(), &raw(&[("a b", "int")])),
            Err(Error::InvalidSchema { .. })
        ));
        assert!(matches!(
            SchemaDescriptor::parse(&family(), &BTreeMap::new()),
            Err(Error::InvalidSchema { .. })
        ));
    }

    #[test]
    fn renders_postgres_ddl() {
        let schema =
            SchemaDescriptor::parse(&family(), &raw(&[("user", "string"), ("port", "int")]))
                .unwrap();
        let statements =
            SchemaBuilder::table_definition(&family(), &schema).create_statements(Dialect::Postgres);
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0].sql,
            "CREATE TABLE IF NOT EXISTS \"auth\" (id BIGSERIAL PRIMARY KEY, \"port\" BIGINT, \"user\" VARCHAR(255), ingested_at TIMESTAMPTZ NOT NULL)"
        );
        assert_eq!(
            statements[1].sql,
            "CREATE INDEX IF NOT EXISTS \"auth_ingested_at_idx\" ON \"auth\" (ingested_at)"
        );
    }

    #[test]
    fn renders_sqlite_ddl() {
        let schema = SchemaDescriptor::parse(&family(), &raw(&[("port", "int")])).unwrap();
        let statements =
            SchemaBuilder::table_definition(&family(), &schema).create_statements(Dialect::Sqlite);
        assert_eq!(
            statements[0].sql,
            "CREATE TABLE IF NOT EXISTS \"auth\" (id INTEGER PRIMARY KEY AUTOINCREMENT, \"port\" INTEGER, ingested_at INTEGER NOT NULL)"
        );
    }
}
