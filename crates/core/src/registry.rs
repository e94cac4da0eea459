//! The shard pool and its family membership.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::shard::Shard;
use crate::statement::Statement;

/// Ordered collection of shards, built once at startup.
///
/// Family sets are guarded per shard; provisioning of new families is
/// serialized through [`ShardRegistry::claim`].
#[derive(Debug)]
pub struct ShardRegistry {
    shards: Vec<Arc<Shard>>,
    provisioning: Mutex<()>,
}

impl ShardRegistry {
    /// Builds a registry from connected shards. An empty pool is fatal.
    pub fn new(shards: Vec<Shard>) -> Result<Self> {
        if shards.is_empty() {
            return Err(Error::topology("no shard established a connection"));
        }
        Ok(Self {
            shards: shards.into_iter().map(Arc::new).collect(),
            provisioning: Mutex::new(()),
        })
    }

    /// All shards in registry order.
    pub fn shards(&self) -> &[Arc<Shard>] {
        &self.shards
    }

    /// Shards whose last contact succeeded, in registry order.
    pub fn available_shards(&self) -> Vec<Arc<Shard>> {
        self.shards
            .iter()
            .filter(|shard| shard.is_available())
            .cloned()
            .collect()
    }

    /// Number of shards.
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Always false for a constructed registry.
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Reconciles every shard's family set with its actual tables. Additive
    /// and idempotent. Returns how many shards answered.
    pub async fn refresh_families(&self) -> usize {
        let mut reachable = 0;
        for shard in &self.shards {
            if shard.refresh().await {
                reachable += 1;
            }
        }
        reachable
    }

    /// Takes the provisioning claim. Holders may create family tables; no two
    /// holders run at once.
    pub async fn claim(&self) -> MutexGuard<'_, ()> {
        self.provisioning.lock().await
    }

    /// Startup preparation: ensures the audit table on every shard and loads
    /// the initial family sets. Per-shard failures are logged, not fatal.
    pub async fn prepare(&self) {
        for shard in &self.shards {
            let statement = Statement::create_raw_log_table(shard.connection().dialect());
            if let Err(err) = shard.connection().execute(&statement).await {
                warn!(shard = %shard.label(), error = %err, "failed to create audit table");
            }
        }
        let reachable = self.refresh_families().await;
        info!(
            shards = self.shards.len(),
            reachable,
            "shard registry ready"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockShardConnection;

    #[test]
    fn empty_registry_is_a_topology_error() {
        let err = ShardRegistry::new(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Topology(_)));
    }

    #[tokio::test]
    async fn prepare_creates_audit_table_everywhere() {
        let first = Arc::new(MockShardConnection::new());
        let second = Arc::new(MockShardConnection::with_tables(["auth"]));
        let registry = ShardRegistry::new(vec![
            Shard::new(0, "mock-0", first.clone()),
            Shard::new(1, "mock-1", second.clone()),
        ])
        .unwrap();

        registry.prepare().await;

        assert!(first.has_table("raw_logs"));
        assert!(second.has_table("raw_logs"));
        assert!(registry.shards()[1].hosts("auth"));
        assert_eq!(registry.shards()[0].family_count(), 0);
    }

    #[tokio::test]
    async fn refresh_counts_reachable_shards() {
        let up = Arc::new(MockShardConnection::with_tables(["a"]));
        let down = Arc::new(MockShardConnection::new());
        down.fail_list_tables(true);
        let registry = ShardRegistry::new(vec![
            Shard::new(0, "up", up),
            Shard::new(1, "down", down),
        ])
        .unwrap();

        assert_eq!(registry.refresh_families().await, 1);
        assert_eq!(registry.available_shards().len(), 1);
        assert_eq!(registry.available_shards()[0].label(), "up");
    }
}
