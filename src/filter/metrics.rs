//! Per-query filter metrics. Grounded on the counter/gauge vocabulary of
//! `core::metrics::MetricsCollector`, but backed by real `tracing` events
//! rather than the teacher's no-op `Logger` stub — every non-trivial
//! state transition this subsystem makes is observable.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

#[derive(Default)]
pub struct FilterMetrics {
    rows_inserted: AtomicU64,
    probes: AtomicU64,
    probes_maybe: AtomicU64,
    bloom_promotions: AtomicU64,
    merges: AtomicU64,
    timeouts: AtomicU64,
    publishes: AtomicU64,
}

impl FilterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_insert(&self) {
        self.rows_inserted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insert_batch(&self, n: u64) {
        self.rows_inserted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_probe(&self, maybe: bool) {
        self.probes.fetch_add(1, Ordering::Relaxed);
        if maybe {
            self.probes_maybe.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_bloom_promotion(&self, filter_id: u32) {
        self.bloom_promotions.fetch_add(1, Ordering::Relaxed);
        info!(filter_id, "in-or-bloom filter promoted to bloom");
    }

    pub fn record_merge(&self) {
        self.merges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self, filter_id: u32) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        info!(filter_id, "filter wait timed out");
    }

    pub fn record_publish(&self, filter_id: u32) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
        info!(filter_id, "filter published");
    }

    pub fn snapshot(&self) -> FilterMetricsSnapshot {
        FilterMetricsSnapshot {
            rows_inserted: self.rows_inserted.load(Ordering::Relaxed),
            probes: self.probes.load(Ordering::Relaxed),
            probes_maybe: self.probes_maybe.load(Ordering::Relaxed),
            bloom_promotions: self.bloom_promotions.load(Ordering::Relaxed),
            merges: self.merges.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            publishes: self.publishes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterMetricsSnapshot {
    pub rows_inserted: u64,
    pub probes: u64,
    pub probes_maybe: u64,
    pub bloom_promotions: u64,
    pub merges: u64,
    pub timeouts: u64,
    pub publishes: u64,
}

impl FilterMetricsSnapshot {
    pub fn observed_selectivity(&self) -> Option<f64> {
        if self.probes == 0 {
            None
        } else {
            Some(self.probes_maybe as f64 / self.probes as f64)
        }
    }
}
