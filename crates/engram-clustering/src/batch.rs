//! Batch retraining: HDBSCAN over the full corpus, computed offline and
//! installed in one swap.

use std::collections::BTreeMap;

use chrono::Utc;
use hdbscan::{Hdbscan, HdbscanHyperParams};

use engram_core::config::ClusteringConfig;
use engram_core::errors::{ClusteringError, EngramResult};
use engram_core::models::{AssignmentSource, ClusterAssignment, ClusterId, Confidence};

use crate::labeling::label_groups;
use crate::model::{BatchModel, ClusterProfile};
use crate::similarity::{cosine_similarity, mean_vector, softmax};
use crate::view::{classify, nearest, Centroid, Thresholds};

/// One corpus vector fed to a retrain.
#[derive(Debug, Clone, Copy)]
pub struct RetrainInput<'a> {
    pub node_id: &'a str,
    pub vector: &'a [f32],
    pub text: &'a str,
}

/// A fully computed retrain, ready to install.
#[derive(Debug, Clone)]
pub struct RetrainOutcome {
    pub model: BatchModel,
    pub centroids: Vec<Centroid>,
    /// New assignment for every input, in input order.
    pub assignments: Vec<(String, ClusterAssignment)>,
    pub noise: usize,
    /// Clusters that did not match any previous cluster.
    pub promoted: usize,
    pub next_id: ClusterId,
}

/// Cluster the whole corpus. Pure: reads `previous` centroids only to keep
/// cluster ids stable across retrains.
pub fn compute_retrain(
    inputs: &[RetrainInput<'_>],
    previous: &[Centroid],
    next_id: ClusterId,
    config: &ClusteringConfig,
) -> EngramResult<RetrainOutcome> {
    let dims = inputs.first().map(|i| i.vector.len());
    if let Some(expected) = dims {
        if let Some(bad) = inputs.iter().find(|i| i.vector.len() != expected) {
            return Err(ClusteringError::DimensionMismatch {
                expected,
                actual: bad.vector.len(),
            }
            .into());
        }
    }

    let labels = hdbscan_labels(inputs, config.min_cluster_size)?;

    // BTreeMap keeps group order deterministic for a given input.
    let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    let mut noise = 0;
    for (idx, &label) in labels.iter().enumerate() {
        if label < 0 {
            noise += 1;
        } else {
            groups.entry(label).or_default().push(idx);
        }
    }
    let mut groups: Vec<Vec<usize>> = groups.into_values().collect();
    groups.sort_by_key(|g| std::cmp::Reverse(g.len()));

    let texts: Vec<Vec<&str>> = groups
        .iter()
        .map(|g| g.iter().map(|&i| inputs[i].text).collect())
        .collect();
    let names = label_groups(&texts, config.label_terms);

    let mut next_id = next_id;
    let mut promoted = 0;
    let mut reused: Vec<ClusterId> = Vec::new();
    let mut clusters = Vec::with_capacity(groups.len());
    for (group, label) in groups.iter().zip(names) {
        let centroid = mean_vector(group.iter().map(|&i| inputs[i].vector));
        let cohesion = group
            .iter()
            .map(|&i| cosine_similarity(inputs[i].vector, &centroid))
            .sum::<f64>()
            / group.len() as f64;

        let id = match matching_previous(previous, &reused, &centroid, config.centroid_join_threshold) {
            Some(id) => {
                reused.push(id);
                id
            }
            None => {
                promoted += 1;
                next_id += 1;
                next_id - 1
            }
        };
        clusters.push(ClusterProfile {
            id,
            centroid,
            cohesion,
            size: group.len(),
            label,
        });
    }

    let model = BatchModel {
        clusters,
        dimensions: dims,
        trained_on: inputs.len(),
        trained_at: Some(Utc::now()),
    };
    let centroids: Vec<Centroid> = model
        .clusters
        .iter()
        .map(|c| Centroid {
            cluster_id: c.id,
            mean: c.centroid.clone(),
            members: c.size,
            label: Some(c.label.clone()),
        })
        .collect();

    let mut member_of: Vec<Option<usize>> = vec![None; inputs.len()];
    for (ci, group) in groups.iter().enumerate() {
        for &i in group {
            member_of[i] = Some(ci);
        }
    }
    let thresholds = Thresholds::from(config);
    let assignments = inputs
        .iter()
        .zip(&member_of)
        .map(|(input, member)| {
            let assignment = match member {
                Some(ci) => member_assignment(&model, &centroids, *ci, input.vector, &thresholds),
                None => classify(&model, &centroids, &thresholds, input.vector),
            };
            (input.node_id.to_string(), assignment)
        })
        .collect();

    Ok(RetrainOutcome {
        model,
        centroids,
        assignments,
        noise,
        promoted,
        next_id,
    })
}

fn hdbscan_labels(inputs: &[RetrainInput<'_>], min_cluster_size: usize) -> EngramResult<Vec<i32>> {
    if inputs.len() < min_cluster_size.max(2) {
        return Ok(vec![-1; inputs.len()]);
    }
    let features: Vec<Vec<f32>> = inputs.iter().map(|i| i.vector.to_vec()).collect();
    let hyper_params = HdbscanHyperParams::builder()
        .min_cluster_size(min_cluster_size)
        .min_samples(1)
        .build();
    let clusterer = Hdbscan::new(&features, hyper_params);
    clusterer.cluster().map_err(|e| {
        ClusteringError::TrainingFailed {
            reason: format!("{e:?}"),
        }
        .into()
    })
}

/// Previous cluster whose centroid best matches, above the join threshold.
fn matching_previous(
    previous: &[Centroid],
    taken: &[ClusterId],
    centroid: &[f32],
    threshold: f64,
) -> Option<ClusterId> {
    previous
        .iter()
        .filter(|p| !taken.contains(&p.cluster_id))
        .map(|p| (p.cluster_id, cosine_similarity(centroid, &p.mean)))
        .filter(|(_, sim)| *sim >= threshold)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(id, _)| id)
}

/// Members keep the cluster the batch model put them in; their confidence
/// is the model's membership score for that cluster.
fn member_assignment(
    model: &BatchModel,
    centroids: &[Centroid],
    cluster_index: usize,
    vector: &[f32],
    thresholds: &Thresholds,
) -> ClusterAssignment {
    let sims: Vec<f64> = model
        .clusters
        .iter()
        .map(|c| cosine_similarity(vector, &c.centroid))
        .collect();
    let shares = softmax(&sims, thresholds.temperature);
    let own = &model.clusters[cluster_index];
    let strength = (sims[cluster_index] / own.cohesion.max(f64::EPSILON)).clamp(0.0, 1.0);
    ClusterAssignment {
        cluster_id: Some(own.id),
        label: Some(own.label.clone()).filter(|l| !l.is_empty()),
        confidence: Confidence::new(strength * shares[cluster_index]),
        nearest: nearest(centroids, vector),
        is_new_cluster: false,
        source: AssignmentSource::BatchModel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs<'a>(rows: &'a [(String, Vec<f32>, String)]) -> Vec<RetrainInput<'a>> {
        rows.iter()
            .map(|(id, v, t)| RetrainInput {
                node_id: id,
                vector: v,
                text: t,
            })
            .collect()
    }

    #[test]
    fn tiny_corpus_is_all_noise() {
        let rows = vec![("a".to_string(), vec![1.0, 0.0], "x".to_string())];
        let out = compute_retrain(&inputs(&rows), &[], 0, &ClusteringConfig::default()).unwrap();
        assert!(out.model.is_empty());
        assert_eq!(out.noise, 1);
        assert_eq!(out.assignments.len(), 1);
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let rows = vec![
            ("a".to_string(), vec![1.0, 0.0], "x".to_string()),
            ("b".to_string(), vec![1.0], "y".to_string()),
        ];
        assert!(compute_retrain(&inputs(&rows), &[], 0, &ClusteringConfig::default()).is_err());
    }

    #[test]
    fn previous_ids_are_reused() {
        let previous = vec![Centroid {
            cluster_id: 9,
            mean: vec![1.0, 0.0, 0.0],
            members: 3,
            label: None,
        }];
        let id = matching_previous(&previous, &[], &[0.99, 0.1, 0.0], 0.7);
        assert_eq!(id, Some(9));
        assert_eq!(matching_previous(&previous, &[9], &[0.99, 0.1, 0.0], 0.7), None);
    }
}
