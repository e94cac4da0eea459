//! Shard selection for families that have never been seen.

use std::sync::Arc;

use crate::shard::Shard;

/// Chooses the shard that will host a new family.
///
/// Placement is decided once per family; existing families are never moved.
pub trait PlacementPolicy: Send + Sync {
    /// Picks one of `candidates`, or `None` if there is nothing to pick.
    fn select(&self, candidates: &[Arc<Shard>]) -> Option<Arc<Shard>>;
}

/// Picks the shard hosting the fewest families; the earliest shard wins ties.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastLoaded;

impl PlacementPolicy for LeastLoaded {
    fn select(&self, candidates: &[Arc<Shard>]) -> Option<Arc<Shard>> {
        let mut best: Option<(&Arc<Shard>, usize)> = None;
        for shard in candidates {
            let count = shard.family_count();
            match best {
                Some((_, min)) if count >= min => {}
                _ => best = Some((shard, count)),
            }
        }
        best.map(|(shard, _)| Arc::clone(shard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockShardConnection;

    fn shard(id: usize, families: &[&str]) -> Arc<Shard> {
        let shard = Shard::new(id, format!("s{id}"), Arc::new(MockShardConnection::new()));
        for family in families {
            shard.register_family(*family);
        }
        Arc::new(shard)
    }

    #[test]
    fn picks_least_loaded_shard() {
        let shards = vec![shard(0, &["a", "b"]), shard(1, &["c"]), shard(2, &["d", "e"])];
        let chosen = LeastLoaded.select(&shards).unwrap();
        assert_eq!(chosen.id(), 1);
        assert!(shards
            .iter()
            .all(|other| chosen.family_count() <= other.family_count()));
    }

    #[test]
    fn ties_go_to_first_seen() {
        let shards = vec![shard(0, &["a"]), shard(1, &["b"]), shard(2, &[])];
        assert_eq!(LeastLoaded.select(&shards).unwrap().id(), 2);

        let shards = vec![shard(0, &[]), shard(1, &[])];
        assert_eq!(LeastLoaded.select(&shards).unwrap().id(), 0);
    }

    #[test]
    fn empty_candidates_yield_nothing() {
        assert!(LeastLoaded.select(&[]).is_none());
    }
}
