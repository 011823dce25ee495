use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Query-side counters.
#[derive(Debug, Default)]
pub struct RetrievalMetrics {
    queries: AtomicU64,
    empty_results: AtomicU64,
    partial_results: AtomicU64,
    unauthorized: AtomicU64,
    results_returned: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalSnapshot {
    pub queries: u64,
    pub empty_results: u64,
    pub partial_results: u64,
    pub unauthorized: u64,
    pub results_returned: u64,
}

impl RetrievalMetrics {
    /// Record a query that ran under a valid scope.
    pub fn record_query(&self, results: usize, partial: bool) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.results_returned
            .fetch_add(results as u64, Ordering::Relaxed);
        if results == 0 {
            self.empty_results.fetch_add(1, Ordering::Relaxed);
        }
        if partial {
            self.partial_results.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a query refused for lack of scope. Counted separately from
    /// empty results.
    pub fn record_unauthorized(&self) {
        self.unauthorized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RetrievalSnapshot {
        RetrievalSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            empty_results: self.empty_results.load(Ordering::Relaxed),
            partial_results: self.partial_results.load(Ordering::Relaxed),
            unauthorized: self.unauthorized.load(Ordering::Relaxed),
            results_returned: self.results_returned.load(Ordering::Relaxed),
        }
    }
}
