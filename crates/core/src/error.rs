//! Error types for ingestion, routing and retention operations.
//!
//! Every failure falls into one of four categories (see [`ErrorKind`]):
//! - **ClientInput**: the caller sent something we refuse to store or run.
//! - **RoutingMiss**: the referenced family is not hosted by any shard.
//! - **Storage**: a shard rejected or failed a statement.
//! - **Topology**: the shard pool cannot serve the request at all.
//!
//! Driver-level failures are reported as [`DriverError`] by
//! [`ShardConnection`](crate::ShardConnection) implementations and wrapped
//! with operation context into [`Error::Storage`].

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures reported by a shard's database driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The database rejected or failed the statement.
    #[error("database error: {0}")]
    Database(String),

    /// The statement did not complete within the configured bound.
    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    /// The driver cannot represent the requested operation or value.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl DriverError {
    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }
}

/// Coarse classification used by transports to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input from the caller.
    ClientInput,
    /// No shard hosts the referenced family.
    RoutingMiss,
    /// A shard failed while executing a statement.
    Storage,
    /// The shard pool is empty or unusable.
    Topology,
}

/// Errors surfaced by the engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Family name is not a valid table identifier.
    #[error("invalid family name '{0}': expected lowercase letters, digits and underscores")]
    InvalidFamily(String),

    /// Schema map is unusable (bad identifier, reserved column, empty).
    #[error("invalid schema for the {family} family: {message}")]
    InvalidSchema {
        /// Family the schema was declared for
        family: String,
        /// What is wrong with it
        message: String,
    },

    /// An event carries a field the schema does not declare.
    #[error("Data type for the field {field} was not specified in the {family} schema map")]
    UnknownField {
        /// Family being ingested
        family: String,
        /// Offending field
        field: String,
    },

    /// The schema declares a type other than `string` or `int`.
    #[error("Unsupported data type in {family} log for the field {field}: {declared}")]
    UnsupportedType {
        /// Family being ingested
        family: String,
        /// Offending field
        field: String,
        /// Declared type as sent by the caller
        declared: String,
    },

    /// A field value cannot be coerced to its declared column type.
    #[error("Invalid value in {family} log for the field {field}: {message}")]
    InvalidValue {
        /// Family being ingested
        family: String,
        /// Offending field
        field: String,
        /// Why the value was refused
        message: String,
    },

    /// A read query without a recognizable source table.
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    /// Request payload that could not be decoded.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No shard hosts the family.
    #[error("Sorry wasn't able to locate a family that matches {0}")]
    FamilyNotFound(String),

    /// Event could not be serialized for the audit record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A shard failed while executing a statement.
    #[error("{operation} failed on {target}: {source}")]
    Storage {
        /// Operation that failed (`create table`, `insert row`, ...)
        operation: &'static str,
        /// Table or shard the statement addressed
        target: String,
        /// Driver failure
        #[source]
        source: DriverError,
    },

    /// The shard pool cannot serve the request.
    #[error("shard topology error: {0}")]
    Topology(String),
}

impl Error {
    /// Create an invalid schema error
    pub fn invalid_schema(family: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            family: family.into(),
            message: message.into(),
        }
    }

    /// Create an unknown field error
    pub fn unknown_field(family: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            family: family.into(),
            field: field.into(),
        }
    }

    /// Create an unsupported type error
    pub fn unsupported_type(
        family: impl Into<String>,
        field: impl Into<String>,
        declared: impl Into<String>,
    ) -> Self {
        Self::UnsupportedType {
            family: family.into(),
            field: field.into(),
            declared: declared.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        family: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            family: family.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a malformed query error
    pub fn malformed_query(message: impl Into<String>) -> Self {
        Self::MalformedQuery(message.into())
    }

    /// Create a storage error
    pub fn storage(operation: &'static str, target: impl Into<String>, source: DriverError) -> Self {
        Self::Storage {
            operation,
            target: target.into(),
            source,
        }
    }

    /// Create a topology error
    pub fn topology(message: impl Into<String>) -> Self {
        Self::Topology(message.into())
    }

    /// Classify the error for transports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidFamily(_)
            | Error::InvalidSchema { .. }
            | Error::UnknownField { .. }
            | Error::UnsupportedType { .. }
            | Error::InvalidValue { .. }
            | Error::MalformedQuery(_)
            | Error::InvalidRequest(_) => ErrorKind::ClientInput,
            Error::FamilyNotFound(_) => ErrorKind::RoutingMiss,
            Error::Serialization(_) | Error::Storage { .. } => ErrorKind::Storage,
            Error::Topology(_) => ErrorKind::Topology,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_field_message_names_field_and_family() {
        let err = Error::unknown_field("auth", "user");
        assert_eq!(
            err.to_string(),
            "Data type for the field user was not specified in the auth schema map"
        );
        assert_eq!(err.kind(), ErrorKind::ClientInput);
    }

    #[test]
    fn test_unsupported_type_message() {
        let err = Error::unsupported_type("auth", "ok", "bool");
        assert_eq!(
            err.to_string(),
            "Unsupported data type in auth log for the field ok: bool"
        );
    }

    #[test]
    fn test_storage_error_keeps_source() {
        let err = Error::storage("insert row", "auth", DriverError::Timeout(30));
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(
            err.to_string(),
            "insert row failed on auth: operation timed out after 30 seconds"
        );
        match err {
            Error::Storage { source, .. } => assert_eq!(source, DriverError::Timeout(30)),
            _ => panic!("Expected Storage error"),
        }
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            Error::FamilyNotFound("x".into()).kind(),
            ErrorKind::RoutingMiss
        );
        assert_eq!(Error::topology("empty").kind(), ErrorKind::Topology);
        assert_eq!(
            Error::malformed_query("no FROM").kind(),
            ErrorKind::ClientInput
        );
    }
}
