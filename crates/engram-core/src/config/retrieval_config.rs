use serde::{Deserialize, Serialize};

use super::defaults;

/// Retrieval subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Minimum cosine similarity for interaction-level hits.
    pub interaction_threshold: f64,
    /// Minimum cosine similarity for episode-level hits.
    pub episode_threshold: f64,
    /// Additive boost when a candidate shares the query's nearest cluster.
    pub cluster_boost: f64,
    /// RRF k-value for rank fusion.
    pub rrf_k: u32,
    /// Multiplier on the keyword lane's RRF term.
    pub keyword_boost: f64,
    pub default_top_k: usize,
    /// How many candidates each lane contributes to fusion.
    pub lane_depth: usize,
    /// Query timeout used when the caller supplies none.
    pub query_timeout_ms: u64,
    pub bm25_k1: f64,
    pub bm25_b: f64,
    /// Build an approximate index over episodes once the corpus is large enough.
    pub ann_enabled: bool,
    pub ann_min_episodes: usize,
    /// Number of coarse lists in the episode ANN index.
    pub ann_lists: usize,
    /// IVF lists searched per ANN query.
    pub ann_search_lists: usize,
    /// Fraction of unindexed episodes past which the ANN index counts as stale.
    pub ann_stale_ratio: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            interaction_threshold: defaults::DEFAULT_INTERACTION_THRESHOLD,
            episode_threshold: defaults::DEFAULT_EPISODE_THRESHOLD,
            cluster_boost: defaults::DEFAULT_CLUSTER_BOOST,
            rrf_k: defaults::DEFAULT_RRF_K,
            keyword_boost: defaults::DEFAULT_KEYWORD_BOOST,
            default_top_k: defaults::DEFAULT_TOP_K,
            lane_depth: defaults::DEFAULT_LANE_DEPTH,
            query_timeout_ms: defaults::DEFAULT_QUERY_TIMEOUT_MS,
            bm25_k1: defaults::DEFAULT_BM25_K1,
            bm25_b: defaults::DEFAULT_BM25_B,
            ann_enabled: defaults::DEFAULT_ANN_ENABLED,
            ann_min_episodes: defaults::DEFAULT_ANN_MIN_EPISODES,
            ann_lists: defaults::DEFAULT_ANN_LISTS,
            ann_search_lists: defaults::DEFAULT_ANN_SEARCH_LISTS,
            ann_stale_ratio: defaults::DEFAULT_ANN_STALE_RATIO,
        }
    }
}
