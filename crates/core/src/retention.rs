//! Deletion of rows older than a retention cutoff.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use logshard_observability as obs;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::family::{FamilyName, RAW_LOG_TABLE};
use crate::registry::ShardRegistry;
use crate::resolver::FamilyResolver;
use crate::shard::Shard;
use crate::statement::Statement;

/// Format of cutoff dates in purge requests.
pub const PURGE_DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Retention applied by the background sweep unless configured otherwise.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Period of the background sweep unless configured otherwise.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Parses a `dd/mm/yyyy HH:MM:SS` cutoff as UTC.
pub fn parse_purge_date(date: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(date.trim(), PURGE_DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|err| {
            Error::InvalidRequest(format!(
                "date '{}' does not match dd/mm/yyyy HH:MM:SS: {}",
                date, err
            ))
        })
}

/// What a purge deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeCutoff {
    /// Everything older than `now - age`, on every table.
    Rolling(Duration),
    /// Everything in one family ingested before `before`.
    Explicit {
        /// Family whose table is purged.
        family: String,
        /// Exclusive upper bound on `ingested_at`.
        before: DateTime<Utc>,
    },
}

impl Default for PurgeCutoff {
    fn default() -> Self {
        PurgeCutoff::Rolling(DEFAULT_RETENTION)
    }
}

/// Totals of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Tables purged successfully.
    pub tables: usize,
    /// Rows deleted.
    pub deleted: u64,
    /// Tables whose delete failed.
    pub failures: usize,
}

/// Applies retention to the shard pool.
pub struct RetentionPurger {
    resolver: FamilyResolver,
    clock: Arc<dyn Clock>,
    retention: Duration,
    interval: Duration,
}

impl RetentionPurger {
    /// Purger with the default retention and sweep interval.
    pub fn new(registry: Arc<ShardRegistry>) -> Self {
        Self {
            resolver: FamilyResolver::new(registry),
            clock: Arc::new(SystemClock),
            retention: DEFAULT_RETENTION,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Replaces the clock the rolling cutoff is computed from.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Age beyond which the sweep deletes rows.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Period between background sweeps.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs the purge described by `cutoff`.
    pub async fn purge(&self, cutoff: &PurgeCutoff) -> Result<PurgeReport> {
        match cutoff {
            PurgeCutoff::Rolling(age) => Ok(self.sweep_older_than(*age).await),
            PurgeCutoff::Explicit { family, before } => {
                let deleted = self.purge_family(family, *before).await?;
                Ok(PurgeReport {
                    tables: 1,
                    deleted,
                    failures: 0,
                })
            }
        }
    }

    /// Deletes rows older than the configured retention from every family
    /// table and every audit table. Failures are logged and skipped.
    pub async fn sweep(&self) -> PurgeReport {
        self.sweep_older_than(self.retention).await
    }

    async fn sweep_older_than(&self, age: Duration) -> PurgeReport {
        let registry = self.resolver.registry();
        registry.refresh_families().await;

        let cutoff = chrono::Duration::from_std(age)
            .ok()
            .and_then(|age| self.clock.now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut report = PurgeReport::default();
        for shard in registry.shards() {
            let mut tables: Vec<String> = shard.families().into_iter().collect();
            tables.push(RAW_LOG_TABLE.to_string());
            for table in tables {
                match delete_before(shard, &table, cutoff).await {
                    Ok(deleted) => {
                        report.tables += 1;
                        report.deleted += deleted;
                    }
                    Err(err) => {
                        report.failures += 1;
                        obs::record_purge_failure(&table, shard.label(), &err.to_string());
                    }
                }
            }
        }
        info!(
            cutoff = %cutoff,
            tables = report.tables,
            deleted = report.deleted,
            failures = report.failures,
            "retention sweep finished"
        );
        report
    }

    /// Deletes rows of `family` ingested before `before`. Returns the number
    /// of rows removed.
    pub async fn purge_family(&self, family: &str, before: DateTime<Utc>) -> Result<u64> {
        let family = FamilyName::parse(family)?;
        let shard = self
            .resolver
            .locate(family.as_str())
            .await
            .ok_or_else(|| Error::FamilyNotFound(family.to_string()))?;

        match delete_before(&shard, family.as_str(), before).await {
            Ok(deleted) => {
                info!(family = %family, before = %before, deleted, "purged family");
                Ok(deleted)
            }
            Err(err) => {
                obs::record_purge_failure(family.as_str(), shard.label(), &err.to_string());
                Err(err)
            }
        }
    }

    /// Starts the background sweep. The first sweep runs immediately, then
    /// once per interval for the life of the runtime.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let report = self.sweep().await;
                if report.failures > 0 {
                    warn!(failures = report.failures, "retention sweep left tables untouched");
                }
            }
        })
    }
}

async fn delete_before(shard: &Shard, table: &str, cutoff: DateTime<Utc>) -> Result<u64> {
    let statement = Statement::delete_before(shard.connection().dialect(), table, cutoff);
    let deleted = shard
        .connection()
        .execute(&statement)
        .await
        .map_err(|source| Error::storage("purge", table, source))?;
    obs::record_purge(table, shard.label(), deleted);
    Ok(deleted)
}
