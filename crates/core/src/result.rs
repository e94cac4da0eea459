//! Result sets returned by routed read queries.

use serde::ser::{Serialize, Serializer};

/// Sentinel written for SQL NULL cells.
pub const NULL_SENTINEL: &str = "\\N";

/// One cell of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// SQL NULL, rendered as [`NULL_SENTINEL`].
    Null,
    /// Integral value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Anything else, as text.
    Text(String),
}

impl Cell {
    /// Builds a cell from driver text, promoting numeric text to a number.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let trimmed = text.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            return Cell::Integer(value);
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Cell::Float(value),
            _ => Cell::Text(text),
        }
    }

    /// Builds a float cell; non-finite values are kept as text.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Cell::Float(value)
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_str(NULL_SENTINEL),
            Cell::Integer(value) => serializer.serialize_i64(*value),
            Cell::Float(value) => serializer.serialize_f64(*value),
            Cell::Text(value) => serializer.serialize_str(value),
        }
    }
}

/// Column-ordered rows of a read query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// Rows; every row has `columns.len()` cells.
    pub rows: Vec<Vec<Cell>>,
}
