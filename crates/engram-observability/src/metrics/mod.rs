//! Engine counters.
//!
//! [`EngineMetrics`] is shared by the query path and the ingestion worker,
//! so every counter is atomic; [`EngineMetrics::snapshot`] produces a
//! serializable copy.

mod ingestion_metrics;
mod retrieval_metrics;

pub use ingestion_metrics::{IngestionMetrics, IngestionSnapshot};
pub use retrieval_metrics::{RetrievalMetrics, RetrievalSnapshot};

use serde::Serialize;

/// Central registry of engine counters.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub retrieval: RetrievalMetrics,
    pub ingestion: IngestionMetrics,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub retrieval: RetrievalSnapshot,
    pub ingestion: IngestionSnapshot,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            retrieval: self.retrieval.snapshot(),
            ingestion: self.ingestion.snapshot(),
        }
    }
}
