use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Ingest-side counters.
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    accepted: AtomicU64,
    duplicates: AtomicU64,
    deferred: AtomicU64,
    unavailable: AtomicU64,
    rejected: AtomicU64,
    throttled: AtomicU64,
    flushes: AtomicU64,
    flushed_records: AtomicU64,
    index_rebuilds: AtomicU64,
    reclusters: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionSnapshot {
    pub accepted: u64,
    pub duplicates: u64,
    pub deferred: u64,
    /// Items past their attempt limit, still queued for retry.
    pub unavailable: u64,
    pub rejected: u64,
    pub throttled: u64,
    pub flushes: u64,
    pub flushed_records: u64,
    pub index_rebuilds: u64,
    pub reclusters: u64,
}

impl IngestionMetrics {
    pub fn record_accepted(&self, n: u64) {
        self.accepted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unavailable(&self) {
        self.unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recluster(&self) {
        self.reclusters.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_throttled(&self) {
        self.throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, records: u64) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.flushed_records.fetch_add(records, Ordering::Relaxed);
    }

    pub fn record_index_rebuild(&self) {
        self.index_rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestionSnapshot {
        IngestionSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flushed_records: self.flushed_records.load(Ordering::Relaxed),
            index_rebuilds: self.index_rebuilds.load(Ordering::Relaxed),
            reclusters: self.reclusters.load(Ordering::Relaxed),
        }
    }
}
