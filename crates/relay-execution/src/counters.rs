//! Per-execution counters (§3: `nodesExecuted`, `nodesFailed`, `retries`,
//! `parallelBranches`). Atomics rather than a mutex since each field is
//! updated independently and never read-modify-written as a group.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counters {
    nodes_executed: AtomicU64,
    nodes_failed: AtomicU64,
    retries: AtomicU64,
    parallel_branches: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CountersSnapshot {
    pub nodes_executed: u64,
    pub nodes_failed: u64,
    pub retries: u64,
    pub parallel_branches: u64,
}

impl Counters {
    pub fn record_node_executed(&self) {
        self.nodes_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_node_failed(&self) {
        self.nodes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parallel_branches(&self, new_paths: u64) {
        self.parallel_branches.fetch_add(new_paths, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            nodes_executed: self.nodes_executed.load(Ordering::Relaxed),
            nodes_failed: self.nodes_failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            parallel_branches: self.parallel_branches.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let counters = Counters::default();
        counters.record_node_executed();
        counters.record_node_executed();
        counters.record_node_failed();
        counters.record_retry();
        counters.record_parallel_branches(3);

        let snap = counters.snapshot();
        assert_eq!(snap.nodes_executed, 2);
        assert_eq!(snap.nodes_failed, 1);
        assert_eq!(snap.retries, 1);
        assert_eq!(snap.parallel_branches, 3);
    }
}
