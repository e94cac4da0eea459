//! Family names and SQL identifier rules.

use std::fmt;

use crate::error::{Error, Result};

/// Longest identifier accepted for tables and columns.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Name of the audit table present on every shard.
pub const RAW_LOG_TABLE: &str = "raw_logs";

/// Prefix SQLite keeps for its own tables.
const RESERVED_PREFIX: &str = "sqlite_";

/// Returns true when `name` is usable as an unparameterized table or column
/// identifier: `[a-z_][a-z0-9_]*`, at most [`MAX_IDENTIFIER_LEN`] bytes.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_lowercase() || first == '_') {
        return false;
    }
    name.len() <= MAX_IDENTIFIER_LEN
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Double-quotes an identifier that already passed [`is_valid_identifier`].
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Validated name of a log family. One family maps to one table on one shard.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FamilyName(String);

impl FamilyName {
    /// Trims and validates a caller-supplied family name.
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim();
        if !is_valid_identifier(name)
            || name == RAW_LOG_TABLE
            || name.starts_with(RESERVED_PREFIX)
        {
            return Err(Error::InvalidFamily(raw.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// Borrow the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quoted form for statement text.
    pub(crate) fn quoted(&self) -> String {
        quote_identifier(&self.0)
    }
}

impl fmt::Display for FamilyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FamilyName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
