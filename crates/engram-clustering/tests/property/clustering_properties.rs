//! Property tests: confidence bounds and the unclustered fallthrough.

use std::sync::Arc;

use proptest::prelude::*;

use engram_clustering::{BatchModel, Centroid, ClusterView, Thresholds};
use engram_core::config::ClusteringConfig;
use engram_core::models::AssignmentSource;

fn vector(dims: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-1.0f32..1.0, dims)
}

proptest! {
    #[test]
    fn prop_confidence_in_unit_interval(
        centroids in prop::collection::vec(vector(6), 0..6),
        sample in vector(6),
    ) {
        let view = ClusterView::new(
            Arc::new(BatchModel::default()),
            Arc::new(
                centroids
                    .into_iter()
                    .enumerate()
                    .map(|(i, mean)| Centroid { cluster_id: i as u32, mean, members: 1, label: None })
                    .collect(),
            ),
            Thresholds::from(&ClusteringConfig::default()),
        );
        let a = view.predict(&sample);
        let c = a.confidence.value();
        prop_assert!((0.0..=1.0).contains(&c));
        if a.cluster_id.is_none() && !a.is_new_cluster {
            prop_assert_eq!(a.source, AssignmentSource::Unassigned);
        }
    }

    #[test]
    fn prop_between_thresholds_stays_unclustered(angle in 0.41f64..0.69) {
        // One centroid on the x axis; the sample's cosine to it is `angle`,
        // so it fails the join (0.7) and the novelty (1 - sim >= 0.6) tests.
        let sample = vec![angle as f32, (1.0 - angle * angle).sqrt() as f32];
        let view = ClusterView::new(
            Arc::new(BatchModel::default()),
            Arc::new(vec![Centroid { cluster_id: 0, mean: vec![1.0, 0.0], members: 1, label: None }]),
            Thresholds::from(&ClusteringConfig::default()),
        );
        let a = view.predict(&sample);
        prop_assert!(!a.is_clustered());
        prop_assert!(!a.is_new_cluster);
    }
}
