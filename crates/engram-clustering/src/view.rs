//! Read-only view of the cluster state, shared with query workers.
//!
//! Assignment runs one state machine: soft-predict against the batch
//! model, else join the nearest centroid, else become a new-cluster
//! candidate when novel enough, else stay unassigned.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use engram_core::config::ClusteringConfig;
use engram_core::models::{
    AssignmentSource, ClusterAssignment, ClusterId, Confidence, NearestCluster,
};

use crate::model::BatchModel;
use crate::similarity::cosine_similarity;

/// How many nearest clusters an assignment lists.
pub const NEAREST_LIMIT: usize = 3;

/// Streaming centroid of a cluster: the batch centroid moved by every
/// member accepted since the last retrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub cluster_id: ClusterId,
    pub mean: Vec<f32>,
    pub members: usize,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub soft_predict: f64,
    pub centroid_join: f64,
    pub novelty: f64,
    pub temperature: f64,
}

impl From<&ClusteringConfig> for Thresholds {
    fn from(config: &ClusteringConfig) -> Self {
        Self {
            soft_predict: config.soft_predict_threshold,
            centroid_join: config.centroid_join_threshold,
            novelty: config.novelty_threshold,
            temperature: config.softmax_temperature,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClusterView {
    model: Arc<BatchModel>,
    centroids: Arc<Vec<Centroid>>,
    thresholds: Thresholds,
}

impl ClusterView {
    pub fn new(model: Arc<BatchModel>, centroids: Arc<Vec<Centroid>>, thresholds: Thresholds) -> Self {
        Self {
            model,
            centroids,
            thresholds,
        }
    }

    pub fn empty(config: &ClusteringConfig) -> Self {
        Self::new(
            Arc::new(BatchModel::default()),
            Arc::new(Vec::new()),
            Thresholds::from(config),
        )
    }

    /// Assignment a vector would get, without changing any state.
    pub fn predict(&self, vector: &[f32]) -> ClusterAssignment {
        classify(&self.model, &self.centroids, &self.thresholds, vector)
    }

    /// Best known label for a cluster: the batch label, else the
    /// streaming one.
    pub fn label(&self, id: ClusterId) -> Option<&str> {
        current_label(&self.model, &self.centroids, id)
    }

    pub fn cluster_count(&self) -> usize {
        self.centroids.len()
    }

    pub fn model(&self) -> &BatchModel {
        &self.model
    }
}

pub(crate) fn current_label<'a>(
    model: &'a BatchModel,
    centroids: &'a [Centroid],
    id: ClusterId,
) -> Option<&'a str> {
    model
        .get(id)
        .map(|c| c.label.as_str())
        .filter(|l| !l.is_empty())
        .or_else(|| {
            centroids
                .iter()
                .find(|c| c.cluster_id == id)
                .and_then(|c| c.label.as_deref())
        })
}

pub(crate) fn nearest(centroids: &[Centroid], vector: &[f32]) -> Vec<NearestCluster> {
    let mut near: Vec<NearestCluster> = centroids
        .iter()
        .map(|c| NearestCluster {
            cluster_id: c.cluster_id,
            similarity: cosine_similarity(vector, &c.mean),
        })
        .collect();
    near.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cluster_id.cmp(&b.cluster_id))
    });
    near.truncate(NEAREST_LIMIT);
    near
}

pub(crate) fn classify(
    model: &BatchModel,
    centroids: &[Centroid],
    thresholds: &Thresholds,
    vector: &[f32],
) -> ClusterAssignment {
    let near = nearest(centroids, vector);
    let label_of = |id| current_label(model, centroids, id).map(str::to_string);

    if let Some(p) = model.soft_predict(vector, thresholds.temperature) {
        if p.confidence.meets(thresholds.soft_predict) {
            return ClusterAssignment {
                cluster_id: Some(p.cluster_id),
                label: label_of(p.cluster_id),
                confidence: p.confidence,
                nearest: near,
                is_new_cluster: false,
                source: AssignmentSource::BatchModel,
            };
        }
    }

    let best_sim = near.first().map(|n| n.similarity);
    if let Some(best) = near.first() {
        if best.similarity >= thresholds.centroid_join {
            return ClusterAssignment {
                cluster_id: Some(best.cluster_id),
                label: label_of(best.cluster_id),
                confidence: Confidence::new(best.similarity),
                nearest: near.clone(),
                is_new_cluster: false,
                source: AssignmentSource::Centroid,
            };
        }
    }

    let novelty = 1.0 - best_sim.unwrap_or(0.0).max(0.0);
    if novelty >= thresholds.novelty {
        return ClusterAssignment {
            cluster_id: None,
            label: None,
            confidence: Confidence::new(novelty),
            nearest: near,
            is_new_cluster: true,
            source: AssignmentSource::NewCandidate,
        };
    }

    ClusterAssignment {
        nearest: near,
        ..ClusterAssignment::unassigned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view_with(centroids: Vec<Centroid>) -> ClusterView {
        ClusterView::new(
            Arc::new(BatchModel::default()),
            Arc::new(centroids),
            Thresholds::from(&ClusteringConfig::default()),
        )
    }

    fn centroid(id: ClusterId, mean: Vec<f32>) -> Centroid {
        Centroid {
            cluster_id: id,
            mean,
            members: 1,
            label: Some(format!("topic {id}")),
        }
    }

    #[test]
    fn empty_state_marks_everything_novel() {
        let a = view_with(vec![]).predict(&[1.0, 0.0]);
        assert!(a.is_new_cluster);
        assert_eq!(a.cluster_id, None);
        assert_eq!(a.confidence, Confidence::ONE);
    }

    #[test]
    fn close_vector_joins_centroid() {
        let a = view_with(vec![centroid(2, vec![1.0, 0.0])]).predict(&[0.95, 0.31]);
        assert_eq!(a.cluster_id, Some(2));
        assert_eq!(a.source, AssignmentSource::Centroid);
        assert_eq!(a.label.as_deref(), Some("topic 2"));
    }

    #[test]
    fn middle_ground_stays_unassigned() {
        // similarity 0.6: below the join threshold, novelty only 0.4.
        let a = view_with(vec![centroid(2, vec![1.0, 0.0])]).predict(&[0.6, 0.8]);
        assert!(!a.is_clustered());
        assert!(!a.is_new_cluster);
        assert_eq!(a.source, AssignmentSource::Unassigned);
        assert_eq!(a.nearest_cluster(), Some(2));
    }
}
