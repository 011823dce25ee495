use serde::{Deserialize, Serialize};

use super::defaults;

/// Streaming cluster engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Minimum soft-predict confidence to accept a batch-model cluster.
    pub soft_predict_threshold: f64,
    /// Minimum cosine similarity to join the nearest centroid.
    pub centroid_join_threshold: f64,
    /// Minimum novelty to mark a vector as a new-cluster candidate.
    pub novelty_threshold: f64,
    /// HDBSCAN minimum cluster size for batch retraining.
    pub min_cluster_size: usize,
    /// Upper bound on pending new-cluster candidates between retrains.
    pub max_candidates: usize,
    /// Number of terms in a generated cluster label.
    pub label_terms: usize,
    /// Softmax temperature used to share membership across clusters.
    pub softmax_temperature: f64,
    /// Retrain at least this often while new nodes keep arriving. 0 turns
    /// the timed retrain off.
    pub recluster_interval_ms: u64,
    /// Retrain as soon as this many new-cluster candidates are pending.
    /// 0 turns the pool trigger off.
    pub recluster_candidates: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            soft_predict_threshold: defaults::DEFAULT_SOFT_PREDICT_THRESHOLD,
            centroid_join_threshold: defaults::DEFAULT_CENTROID_JOIN_THRESHOLD,
            novelty_threshold: defaults::DEFAULT_NOVELTY_THRESHOLD,
            min_cluster_size: defaults::DEFAULT_MIN_CLUSTER_SIZE,
            max_candidates: defaults::DEFAULT_MAX_CANDIDATES,
            label_terms: defaults::DEFAULT_LABEL_TERMS,
            softmax_temperature: defaults::DEFAULT_SOFTMAX_TEMPERATURE,
            recluster_interval_ms: defaults::DEFAULT_RECLUSTER_INTERVAL_MS,
            recluster_candidates: defaults::DEFAULT_RECLUSTER_CANDIDATES,
        }
    }
}
