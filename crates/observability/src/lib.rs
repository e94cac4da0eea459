use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{info, warn};

static EVENTS_INGESTED_TOTAL: AtomicU64 = AtomicU64::new(0);
static INGEST_FAILURES_TOTAL: AtomicU64 = AtomicU64::new(0);
static FAMILIES_PROVISIONED_TOTAL: AtomicU64 = AtomicU64::new(0);
static QUERIES_TOTAL: AtomicU64 = AtomicU64::new(0);
static ROWS_PURGED_TOTAL: AtomicU64 = AtomicU64::new(0);
static PURGE_FAILURES_TOTAL: AtomicU64 = AtomicU64::new(0);

fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Records ingest latency and adds the batch to the ingested events counter.
pub fn record_ingest_latency(family: &str, shard: &str, events: usize, duration: Duration) {
    let total = EVENTS_INGESTED_TOTAL.fetch_add(events as u64, Ordering::Relaxed) + events as u64;
    info!(
        metric = "ingest_latency_ms",
        family,
        shard,
        events,
        latency_ms = duration_ms(duration),
        events_ingested_total = total
    );
}

/// Marks a rejected or failed ingest request.
pub fn record_ingest_failure(family: &str, reason: &str) {
    let total = INGEST_FAILURES_TOTAL.fetch_add(1, Ordering::Relaxed) + 1;
    warn!(
        metric = "ingest_failure",
        family,
        reason,
        ingest_failures_total = total
    );
}

/// Records the placement of a new family and the shard's resulting load.
pub fn record_placement(family: &str, shard: &str, shard_families: usize) {
    let total = FAMILIES_PROVISIONED_TOTAL.fetch_add(1, Ordering::Relaxed) + 1;
    info!(
        metric = "family_placement",
        family,
        shard,
        shard_families,
        families_provisioned_total = total
    );
}

/// Records routed query latency.
pub fn record_query_latency(table: &str, shard: &str, rows: usize, duration: Duration) {
    let total = QUERIES_TOTAL.fetch_add(1, Ordering::Relaxed) + 1;
    info!(
        metric = "query_latency_ms",
        table,
        shard,
        rows,
        latency_ms = duration_ms(duration),
        queries_total = total
    );
}

/// Records rows removed from one table by a retention purge.
pub fn record_purge(table: &str, shard: &str, deleted: u64) {
    let total = ROWS_PURGED_TOTAL.fetch_add(deleted, Ordering::Relaxed) + deleted;
    info!(
        metric = "purge_rows",
        table,
        shard,
        deleted,
        rows_purged_total = total
    );
}

/// Records a table that could not be purged.
pub fn record_purge_failure(table: &str, shard: &str, error: &str) {
    let total = PURGE_FAILURES_TOTAL.fetch_add(1, Ordering::Relaxed) + 1;
    warn!(
        metric = "purge_failure",
        table,
        shard,
        error,
        purge_failures_total = total
    );
}

/// Point-in-time copy of the process counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub events_ingested: u64,
    pub ingest_failures: u64,
    pub families_provisioned: u64,
    pub queries: u64,
    pub rows_purged: u64,
    pub purge_failures: u64,
}

/// Reads every counter.
pub fn snapshot() -> CounterSnapshot {
    CounterSnapshot {
        events_ingested: EVENTS_INGESTED_TOTAL.load(Ordering::Relaxed),
        ingest_failures: INGEST_FAILURES_TOTAL.load(Ordering::Relaxed),
        families_provisioned: FAMILIES_PROVISIONED_TOTAL.load(Ordering::Relaxed),
        queries: QUERIES_TOTAL.load(Ordering::Relaxed),
        rows_purged: ROWS_PURGED_TOTAL.load(Ordering::Relaxed),
        purge_failures: PURGE_FAILURES_TOTAL.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let before = snapshot();
        record_ingest_latency("auth", "shard-0", 3, Duration::from_millis(4));
        record_placement("auth", "shard-0", 1);
        record_purge("auth", "shard-0", 5);
        record_purge_failure("mail", "shard-1", "timeout");
        let after = snapshot();

        assert!(after.events_ingested >= before.events_ingested + 3);
        assert!(after.families_provisioned > before.families_provisioned);
        assert!(after.rows_purged >= before.rows_purged + 5);
        assert!(after.purge_failures > before.purge_failures);
    }
}
