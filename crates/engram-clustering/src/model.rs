//! The batch model: durable clusters produced by the last retrain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use engram_core::models::{ClusterId, Confidence};

use crate::similarity::{cosine_similarity, softmax};

/// One durable cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub id: ClusterId,
    /// Mean of the member vectors.
    pub centroid: Vec<f32>,
    /// Mean similarity of members to the centroid.
    pub cohesion: f64,
    pub size: usize,
    pub label: String,
}

/// Clusters from the last batch retrain over the full corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BatchModel {
    pub clusters: Vec<ClusterProfile>,
    pub dimensions: Option<usize>,
    pub trained_on: usize,
    pub trained_at: Option<DateTime<Utc>>,
}

/// Outcome of soft prediction against the batch model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftPrediction {
    pub cluster_id: ClusterId,
    pub similarity: f64,
    pub confidence: Confidence,
}

impl BatchModel {
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn get(&self, id: ClusterId) -> Option<&ClusterProfile> {
        self.clusters.iter().find(|c| c.id == id)
    }

    /// Best cluster with its membership confidence.
    ///
    /// Confidence is the best cluster's membership strength,
    /// `clamp(sim / cohesion)`, times its softmax share among all clusters,
    /// so it is always in [0,1] and drops when two clusters compete.
    pub fn soft_predict(&self, vector: &[f32], temperature: f64) -> Option<SoftPrediction> {
        if self.clusters.is_empty() {
            return None;
        }
        let sims: Vec<f64> = self
            .clusters
            .iter()
            .map(|c| cosine_similarity(vector, &c.centroid))
            .collect();
        let shares = softmax(&sims, temperature);
        let (best, &sim) = sims
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
        let cohesion = self.clusters[best].cohesion.max(f64::EPSILON);
        let strength = (sim / cohesion).clamp(0.0, 1.0);
        Some(SoftPrediction {
            cluster_id: self.clusters[best].id,
            similarity: sim,
            confidence: Confidence::new(strength * shares[best]),
        })
    }
}
