//! The streaming cluster engine: owns the batch model, the streaming
//! centroids and the candidate pool. Single writer (the ingestion worker);
//! query workers read a [`ClusterView`]. Retrains run on that same worker,
//! which is what keeps them from interleaving with flushes.

use std::collections::VecDeque;
use std::sync::Arc;

use engram_core::config::ClusteringConfig;
use engram_core::errors::{ClusteringError, EngramResult};
use engram_core::models::{AssignmentSource, ClusterAssignment, ClusterId};

use crate::batch::RetrainOutcome;
use crate::model::BatchModel;
use crate::similarity::running_mean;
use crate::state::{Candidate, ClusterState};
use crate::view::{classify, current_label, Centroid, ClusterView, Thresholds};

pub struct StreamingClusterEngine {
    config: ClusteringConfig,
    model: Arc<BatchModel>,
    centroids: Vec<Centroid>,
    candidates: VecDeque<Candidate>,
    next_id: ClusterId,
}

impl StreamingClusterEngine {
    pub fn new(config: ClusteringConfig) -> Self {
        Self {
            config,
            model: Arc::new(BatchModel::default()),
            centroids: Vec::new(),
            candidates: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Restore from persisted state.
    pub fn from_state(config: ClusteringConfig, state: ClusterState) -> Self {
        Self {
            config,
            model: Arc::new(state.model),
            centroids: state.centroids,
            candidates: state.candidates.into(),
            next_id: state.next_id,
        }
    }

    pub fn to_state(&self) -> ClusterState {
        ClusterState {
            model: (*self.model).clone(),
            centroids: self.centroids.clone(),
            candidates: self.candidates.iter().cloned().collect(),
            next_id: self.next_id,
        }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Run the assignment state machine for a new vector and fold the
    /// outcome into the streaming state. Never fails ingestion: a vector of
    /// the wrong dimension comes back unassigned.
    pub fn assign(&mut self, node_id: &str, vector: &[f32]) -> ClusterAssignment {
        if let Err(e) = self.check_dimensions(vector) {
            tracing::warn!(node_id, error = %e, "skipping cluster assignment");
            return ClusterAssignment::unassigned();
        }
        let assignment = classify(&self.model, &self.centroids, &self.thresholds(), vector);
        match assignment.source {
            AssignmentSource::BatchModel | AssignmentSource::Centroid => {
                if let Some(id) = assignment.cluster_id {
                    self.absorb(id, vector);
                }
            }
            AssignmentSource::NewCandidate => self.push_candidate(node_id, vector),
            AssignmentSource::Unassigned => {}
        }
        assignment
    }

    /// Assignment without side effects, for queries.
    pub fn predict(&self, vector: &[f32]) -> ClusterAssignment {
        classify(&self.model, &self.centroids, &self.thresholds(), vector)
    }

    /// The single accessor for a cluster's best known label.
    pub fn current_label(&self, id: ClusterId) -> Option<&str> {
        current_label(&self.model, &self.centroids, id)
    }

    /// Immutable view for a snapshot.
    pub fn view(&self) -> ClusterView {
        ClusterView::new(
            Arc::clone(&self.model),
            Arc::new(self.centroids.clone()),
            self.thresholds(),
        )
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    pub fn centroids(&self) -> &[Centroid] {
        &self.centroids
    }

    pub fn next_id(&self) -> ClusterId {
        self.next_id
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.model
            .dimensions
            .or_else(|| self.centroids.first().map(|c| c.mean.len()))
    }

    /// Vectors waiting for a retrain to give them a durable cluster.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Swap in a computed retrain. The candidate pool is cleared: the
    /// retrain saw every vector, so candidates are either promoted or noise.
    pub fn install(&mut self, outcome: &RetrainOutcome) {
        self.model = Arc::new(outcome.model.clone());
        self.centroids = outcome.centroids.clone();
        self.candidates.clear();
        self.next_id = self.next_id.max(outcome.next_id);
        tracing::debug!(
            clusters = self.centroids.len(),
            next_id = self.next_id,
            "installed cluster model"
        );
    }

    fn thresholds(&self) -> Thresholds {
        Thresholds::from(&self.config)
    }

    fn check_dimensions(&self, vector: &[f32]) -> EngramResult<()> {
        match self.dimensions() {
            Some(expected) if expected != vector.len() => Err(ClusteringError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }
            .into()),
            _ => Ok(()),
        }
    }

    fn absorb(&mut self, id: ClusterId, vector: &[f32]) {
        if let Some(c) = self.centroids.iter_mut().find(|c| c.cluster_id == id) {
            running_mean(&mut c.mean, c.members, vector);
            c.members += 1;
        }
    }

    fn push_candidate(&mut self, node_id: &str, vector: &[f32]) {
        if self.config.max_candidates == 0 {
            return;
        }
        while self.candidates.len() >= self.config.max_candidates {
            self.candidates.pop_front();
        }
        self.candidates.push_back(Candidate {
            node_id: node_id.to_string(),
            vector: vector.to_vec(),
        });
    }
}
