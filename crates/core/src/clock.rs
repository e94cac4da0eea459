use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};

/// Source of ingestion and purge timestamps.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests.
#[derive(Debug)]
pub struct MockClock {
    now: RwLock<DateTime<Utc>>,
}

impl MockClock {
    /// Clock frozen at `time`.
    pub fn with_time(time: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(time),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now += duration;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}
