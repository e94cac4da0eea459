//! Routing of family names to the shard that hosts them.

use std::sync::Arc;

use crate::registry::ShardRegistry;
use crate::shard::Shard;

/// Finds the shard owning a family.
///
/// Matching is exact after trimming whitespace; a family whose name merely
/// contains, or is contained in, the requested one never matches.
#[derive(Debug, Clone)]
pub struct FamilyResolver {
    registry: Arc<ShardRegistry>,
}

impl FamilyResolver {
    /// Creates a resolver over `registry`.
    pub fn new(registry: Arc<ShardRegistry>) -> Self {
        Self { registry }
    }

    /// The registry being searched.
    pub fn registry(&self) -> &Arc<ShardRegistry> {
        &self.registry
    }

    /// First shard, in registry order, whose known families contain `family`.
    pub fn resolve(&self, family: &str) -> Option<Arc<Shard>> {
        let family = family.trim();
        if family.is_empty() {
            return None;
        }
        self.registry
            .shards()
            .iter()
            .find(|shard| shard.hosts(family))
            .cloned()
    }

    /// Refreshes family membership from the shards, then resolves.
    pub async fn locate(&self, family: &str) -> Option<Arc<Shard>> {
        self.registry.refresh_families().await;
        self.resolve(family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockShardConnection;

    fn registry() -> Arc<ShardRegistry> {
        let s1 = Shard::new(0, "s1", Arc::new(MockShardConnection::with_tables(["a", "b"])));
        let s2 = Shard::new(1, "s2", Arc::new(MockShardConnection::with_tables(["c", "auth_events"])));
        Arc::new(ShardRegistry::new(vec![s1, s2]).unwrap())
    }

    #[tokio::test]
    async fn locates_family_on_owning_shard() {
        let resolver = FamilyResolver::new(registry());
        assert_eq!(resolver.locate("c").await.unwrap().label(), "s2");
        assert_eq!(resolver.resolve("a").unwrap().label(), "s1");
        assert_eq!(resolver.resolve("  b ").unwrap().label(), "s1");
    }

    #[tokio::test]
    async fn never_matches_substrings() {
        let resolver = FamilyResolver::new(registry());
        resolver.registry().refresh_families().await;
        assert!(resolver.resolve("auth").is_none());
        assert!(resolver.resolve("auth_events_old").is_none());
        assert!(resolver.resolve("").is_none());
    }

    #[test]
    fn resolve_without_refresh_only_sees_registered_families() {
        let resolver = FamilyResolver::new(registry());
        assert!(resolver.resolve("c").is_none());
        resolver.registry().shards()[1].register_family("c");
        assert_eq!(resolver.resolve("c").unwrap().id(), 1);
    }
}
