use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

const ISR_EXPANDS: &str = "replica_manager_isr_expands_total";
const ISR_SHRINKS: &str = "replica_manager_isr_shrinks_total";
const LEADER_COUNT: &str = "replica_manager_leader_count";
const UNDER_REPLICATED_PARTITIONS: &str = "replica_manager_under_replicated_partitions";

/// ReplicaMetrics reports ISR churn and leadership counts to the `metrics` facade. Every value is
/// also kept locally so it can be read without an exporter installed.
#[derive(Default)]
pub struct ReplicaMetrics {
    isr_expands: AtomicU64,
    isr_shrinks: AtomicU64,
    leader_count: AtomicUsize,
    under_replicated_partitions: AtomicUsize,
}

impl ReplicaMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isr_expands(&self) -> u64 {
        self.isr_expands.load(Ordering::Relaxed)
    }

    pub fn isr_shrinks(&self) -> u64 {
        self.isr_shrinks.load(Ordering::Relaxed)
    }

    /// Last published leader count gauge.
    pub fn leader_count(&self) -> usize {
        self.leader_count.load(Ordering::Relaxed)
    }

    pub fn under_replicated_partitions(&self) -> usize {
        self.under_replicated_partitions.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_isr_expand(&self) {
        self.isr_expands.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(ISR_EXPANDS).increment(1);
    }

    pub(crate) fn mark_isr_shrink(&self) {
        self.isr_shrinks.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(ISR_SHRINKS).increment(1);
    }

    pub(crate) fn record_leader_gauges(&self, leader_count: usize, under_replicated: usize) {
        self.leader_count.store(leader_count, Ordering::Relaxed);
        self.under_replicated_partitions.store(under_replicated, Ordering::Relaxed);
        metrics::gauge!(LEADER_COUNT).set(leader_count as f64);
        metrics::gauge!(UNDER_REPLICATED_PARTITIONS).set(under_replicated as f64);
    }
}
