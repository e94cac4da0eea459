//! Shards and the driver seam they are reached through.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::DriverError;
use crate::family::RAW_LOG_TABLE;
use crate::result::ResultSet;
use crate::statement::{Dialect, Statement};

/// Primitives a shard's database driver provides.
///
/// Implementations own connection handling and bound every call with a
/// timeout; the engine never talks to a database except through this trait.
#[async_trait]
pub trait ShardConnection: Send + Sync {
    /// SQL flavor used to render statements for this shard.
    fn dialect(&self) -> Dialect;

    /// Names of the tables the database currently holds.
    async fn list_tables(&self) -> Result<Vec<String>, DriverError>;

    /// Runs a parameterized statement, returning the affected row count.
    async fn execute(&self, statement: &Statement) -> Result<u64, DriverError>;

    /// Runs a read query verbatim and collects every row.
    async fn fetch_all(&self, sql: &str) -> Result<ResultSet, DriverError>;
}

/// One database in the pool plus the families it hosts.
pub struct Shard {
    id: usize,
    label: String,
    connection: Arc<dyn ShardConnection>,
    families: RwLock<BTreeSet<String>>,
    available: AtomicBool,
}

impl fmt::Debug for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shard")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("available", &self.is_available())
            .finish_non_exhaustive()
    }
}

impl Shard {
    /// Wraps an established connection. `label` shows up in logs and must not
    /// carry credentials.
    pub fn new(id: usize, label: impl Into<String>, connection: Arc<dyn ShardConnection>) -> Self {
        Self {
            id,
            label: label.into(),
            connection,
            families: RwLock::new(BTreeSet::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Position of the shard in the registry.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Credential-free description of the shard.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Driver handle.
    pub fn connection(&self) -> &dyn ShardConnection {
        self.connection.as_ref()
    }

    /// Whether the last contact with the database succeeded.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Snapshot of hosted families.
    pub fn families(&self) -> BTreeSet<String> {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of hosted families.
    pub fn family_count(&self) -> usize {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Exact membership test.
    pub fn hosts(&self, family: &str) -> bool {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(family)
    }

    /// Records a family as hosted here.
    pub fn register_family(&self, family: impl Into<String>) {
        self.families
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(family.into());
    }

    /// Unions the database's actual tables into the family set. Never
    /// removes entries. Returns false when the database could not be reached.
    pub async fn refresh(&self) -> bool {
        match self.connection.list_tables().await {
            Ok(tables) => {
                let mut families = self.families.write().unwrap_or_else(PoisonError::into_inner);
                families.extend(
                    tables
                        .into_iter()
                        .map(|table| table.trim().to_string())
                        .filter(|table| !table.is_empty() && table != RAW_LOG_TABLE),
                );
                debug!(shard = %self.label, families = families.len(), "refreshed families");
                drop(families);
                self.available.store(true, Ordering::Release);
                true
            }
            Err(err) => {
                warn!(shard = %self.label, error = %err, "failed to list shard tables");
                self.available.store(false, Ordering::Release);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockShardConnection;

    #[tokio::test]
    async fn refresh_is_additive_and_skips_audit_table() {
        let conn = Arc::new(MockShardConnection::with_tables(["auth", "raw_logs"]));
        let shard = Shard::new(0, "mock-0", conn.clone());
        shard.register_family("pending");

        assert!(shard.refresh().await);
        assert_eq!(
            shard.families().into_iter().collect::<Vec<_>>(),
            vec!["auth".to_string(), "pending".to_string()]
        );

        conn.drop_table("auth");
        assert!(shard.refresh().await);
        assert!(shard.hosts("auth"));
    }

    #[tokio::test]
    async fn failed_refresh_marks_shard_unavailable() {
        let conn = Arc::new(MockShardConnection::new());
        let shard = Shard::new(0, "mock-0", conn.clone());
        conn.fail_list_tables(true);
        assert!(!shard.refresh().await);
        assert!(!shard.is_available());

        conn.fail_list_tables(false);
        assert!(shard.refresh().await);
        assert!(shard.is_available());
    }
}
