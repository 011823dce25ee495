//! Persisted cluster state, stored in the `clusters` index.

use serde::{Deserialize, Serialize};

use engram_core::errors::{ConsistencyError, EngramResult};
use engram_core::models::{ClusterId, IndexKind};

use crate::model::BatchModel;
use crate::view::Centroid;

/// A vector waiting for the next retrain to seed a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub node_id: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ClusterState {
    pub model: BatchModel,
    pub centroids: Vec<Centroid>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub next_id: ClusterId,
}

impl ClusterState {
    pub fn to_bytes(&self) -> EngramResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> EngramResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            ConsistencyError::CorruptIndex {
                index: IndexKind::Clusters.as_str().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Vector dimension the state was built for, if it holds any vectors.
    pub fn dimensions(&self) -> Option<usize> {
        self.model
            .dimensions
            .or_else(|| self.centroids.first().map(|c| c.mean.len()))
            .or_else(|| self.candidates.first().map(|c| c.vector.len()))
    }
}
