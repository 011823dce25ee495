pub mod clustering_config;
pub mod defaults;
pub mod embedding_config;
pub mod filter_config;
pub mod ingestion_config;
pub mod observability_config;
pub mod retrieval_config;
pub mod storage_config;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use clustering_config::ClusteringConfig;
pub use embedding_config::EmbeddingConfig;
pub use filter_config::FilterConfig;
pub use ingestion_config::IngestionConfig;
pub use observability_config::ObservabilityConfig;
pub use retrieval_config::RetrievalConfig;
pub use storage_config::{StorageBackend, StorageConfig};

use crate::errors::{EngramError, EngramResult};

/// Top-level configuration, built once and handed to each component's constructor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngramConfig {
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub clustering: ClusteringConfig,
    pub retrieval: RetrievalConfig,
    pub filter: FilterConfig,
    pub ingestion: IngestionConfig,
    pub observability: ObservabilityConfig,
}

impl EngramConfig {
    /// Parse a TOML document. Missing sections and fields take their defaults.
    pub fn from_toml(toml_str: &str) -> EngramResult<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| EngramError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> EngramResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngramError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&raw)
    }

    /// Serialize back to TOML.
    pub fn to_toml(&self) -> EngramResult<String> {
        toml::to_string(self).map_err(|e| EngramError::ConfigError(e.to_string()))
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> EngramResult<()> {
        let unit = [
            ("clustering.soft_predict_threshold", self.clustering.soft_predict_threshold),
            ("clustering.centroid_join_threshold", self.clustering.centroid_join_threshold),
            ("clustering.novelty_threshold", self.clustering.novelty_threshold),
            ("retrieval.interaction_threshold", self.retrieval.interaction_threshold),
            ("retrieval.episode_threshold", self.retrieval.episode_threshold),
            ("retrieval.ann_stale_ratio", self.retrieval.ann_stale_ratio),
            ("filter.depth_delta_bound", self.filter.depth_delta_bound),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngramError::ConfigError(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if self.retrieval.rrf_k == 0 {
            return Err(EngramError::ConfigError(
                "retrieval.rrf_k must be positive".into(),
            ));
        }
        if self.retrieval.keyword_boost < 0.0 || self.retrieval.cluster_boost < 0.0 {
            return Err(EngramError::ConfigError(
                "retrieval boosts must not be negative".into(),
            ));
        }
        if self.retrieval.default_top_k == 0 || self.retrieval.lane_depth == 0 {
            return Err(EngramError::ConfigError(
                "retrieval.default_top_k and retrieval.lane_depth must be positive".into(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(EngramError::ConfigError(
                "embedding.dimensions must be positive".into(),
            ));
        }
        if self.embedding.batch_size == 0 || self.embedding.max_input_tokens == 0 {
            return Err(EngramError::ConfigError(
                "embedding.batch_size and embedding.max_input_tokens must be positive".into(),
            ));
        }
        if self.ingestion.flush_count == 0 || self.ingestion.queue_capacity == 0 {
            return Err(EngramError::ConfigError(
                "ingestion.flush_count and ingestion.queue_capacity must be positive".into(),
            ));
        }
        if self.clustering.min_cluster_size < 2 {
            return Err(EngramError::ConfigError(
                "clustering.min_cluster_size must be at least 2".into(),
            ));
        }
        let clustering = &self.clustering;
        if clustering.recluster_candidates > clustering.max_candidates {
            return Err(EngramError::ConfigError(format!(
                "clustering.recluster_candidates ({}) exceeds clustering.max_candidates ({})",
                clustering.recluster_candidates, clustering.max_candidates
            )));
        }
        if self.clustering.softmax_temperature <= 0.0 {
            return Err(EngramError::ConfigError(
                "clustering.softmax_temperature must be positive".into(),
            ));
        }
        Ok(())
    }
}
