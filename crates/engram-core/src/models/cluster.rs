use serde::{Deserialize, Serialize};

use super::Confidence;

/// Stable identifier of a topic cluster.
pub type ClusterId = u32;

/// Which step of the assignment state machine produced an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSource {
    /// Accepted by the batch model's soft prediction.
    BatchModel,
    /// Joined the nearest centroid.
    Centroid,
    /// Novel enough to seed a cluster at the next retrain.
    NewCandidate,
    #[default]
    Unassigned,
}

/// A cluster and the similarity of a vector to its centroid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestCluster {
    pub cluster_id: ClusterId,
    pub similarity: f64,
}

/// Derived, non-authoritative mapping from a vector to a topic cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ClusterAssignment {
    pub cluster_id: Option<ClusterId>,
    pub label: Option<String>,
    pub confidence: Confidence,
    /// Closest clusters, most similar first.
    pub nearest: Vec<NearestCluster>,
    pub is_new_cluster: bool,
    pub source: AssignmentSource,
}

impl ClusterAssignment {
    pub fn unassigned() -> Self {
        Self::default()
    }

    pub fn is_clustered(&self) -> bool {
        self.cluster_id.is_some()
    }

    /// The cluster a retriever should treat as this vector's topic.
    pub fn nearest_cluster(&self) -> Option<ClusterId> {
        self.cluster_id
            .or_else(|| self.nearest.first().map(|n| n.cluster_id))
    }
}
