//! Error types for shard bootstrap and driver failures.

use std::future::Future;
use std::time::Duration;

use logshard_core::DriverError;
use thiserror::Error;

use crate::dsn::ShardDsnError;

/// Errors raised while connecting a shard.
#[derive(Error, Debug)]
pub enum SqlError {
    /// Connection string could not be built.
    #[error(transparent)]
    Dsn(#[from] ShardDsnError),

    /// The database refused or dropped the connection.
    #[error("failed to connect to {shard}: {source}")]
    Connect {
        /// Redacted shard label.
        shard: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// The connection attempt exceeded its deadline.
    #[error("connecting to {shard} timed out after {seconds} seconds")]
    ConnectTimeout {
        /// Redacted shard label.
        shard: String,
        /// Deadline in seconds.
        seconds: u64,
    },
}

impl SqlError {
    pub(crate) fn connect(shard: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Connect {
            shard: shard.into(),
            source,
        }
    }
}

/// Maps a driver failure to the engine's error type.
pub(crate) fn map_db_error(err: sqlx::Error) -> DriverError {
    match err {
        sqlx::Error::Database(db) => match db.code() {
            Some(code) => DriverError::Database(format!("{} (code {})", db.message(), code)),
            None => DriverError::Database(db.message().to_string()),
        },
        sqlx::Error::PoolTimedOut => DriverError::database("timed out acquiring a connection"),
        other => DriverError::Database(other.to_string()),
    }
}

/// Runs a driver future under `limit`.
pub(crate) async fn with_timeout<F, T>(limit: Duration, operation: F) -> Result<T, DriverError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| DriverError::Timeout(limit.as_secs()))?
        .map_err(map_db_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_maps_to_driver_timeout() {
        let result: Result<(), DriverError> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, sqlx::Error>(())
        })
        .await;
        assert_eq!(result, Err(DriverError::Timeout(0)));
    }

    #[test]
    fn test_non_database_errors_keep_their_message() {
        let err = map_db_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, DriverError::Database(ref message) if message.contains("no rows")));
    }
}
