//! Per-connector-type statistics (§4.4: `{executions, failures,
//! totalDurationMs, lastUsedTs}`), grounded on the atomics-per-field
//! pattern in `relay_execution::Counters`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct ConnectorStats {
    executions: AtomicU64,
    failures: AtomicU64,
    total_duration_ms: AtomicU64,
    last_used_ts: RwLock<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectorStatsSnapshot {
    pub executions: u64,
    pub failures: u64,
    pub total_duration_ms: u64,
    pub last_used_ts: Option<DateTime<Utc>>,
}

impl ConnectorStats {
    pub fn record(&self, duration: Duration, failed: bool) {
        self.executions.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        *self.last_used_ts.write() = Some(Utc::now());
    }

    pub fn snapshot(&self) -> ConnectorStatsSnapshot {
        ConnectorStatsSnapshot {
            executions: self.executions.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            total_duration_ms: self.total_duration_ms.load(Ordering::Relaxed),
            last_used_ts: *self.last_used_ts.read(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_executions_and_failures_independently() {
        let stats = ConnectorStats::default();
        stats.record(Duration::from_millis(10), false);
        stats.record(Duration::from_millis(20), true);

        let snap = stats.snapshot();
        assert_eq!(snap.executions, 2);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.total_duration_ms, 30);
        assert!(snap.last_used_ts.is_some());
    }
}
