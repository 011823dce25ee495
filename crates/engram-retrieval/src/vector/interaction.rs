use rayon::prelude::*;

use engram_clustering::{cosine_similarity, ClusterView};
use engram_core::config::RetrievalConfig;
use engram_core::models::{AuthScope, ClusterId, InteractionNode};

use super::{sort_ranked, Ranked};

/// A ranked node. `similarity` is the raw cosine; `score` adds the
/// cluster boost.
#[derive(Debug, Clone, Copy)]
pub struct ScoredNode<'a> {
    pub node: &'a InteractionNode,
    pub similarity: f64,
    pub score: f64,
}

/// Interaction-level cosine retriever with an additive cluster boost.
pub struct InteractionRetriever<'a> {
    nodes: &'a [InteractionNode],
    clusters: Option<&'a ClusterView>,
    threshold: f64,
    cluster_boost: f64,
}

impl<'a> InteractionRetriever<'a> {
    pub fn new(nodes: &'a [InteractionNode], config: &RetrievalConfig) -> Self {
        Self {
            nodes,
            clusters: None,
            threshold: config.interaction_threshold,
            cluster_boost: config.cluster_boost,
        }
    }

    /// Enable the cluster boost, using `clusters` to find the query's
    /// nearest cluster. The view is only read, never updated.
    pub fn with_clusters(mut self, clusters: &'a ClusterView) -> Self {
        self.clusters = Some(clusters);
        self
    }

    /// Rank the nodes visible to `scope`. Without a scope nothing is ranked.
    pub fn retrieve(
        &self,
        query_vector: &[f32],
        top_k: usize,
        scope: Option<&AuthScope>,
        threshold: Option<f64>,
    ) -> Vec<ScoredNode<'a>> {
        let Some(scope) = scope else {
            return Vec::new();
        };
        let candidates: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.scope.overlaps(scope))
            .map(|(i, _)| i)
            .collect();
        self.rank(query_vector, &candidates, threshold, top_k)
    }

    /// Rank `candidates`, positions the caller has already scoped.
    pub fn rank(
        &self,
        query_vector: &[f32],
        candidates: &[usize],
        threshold: Option<f64>,
        limit: usize,
    ) -> Vec<ScoredNode<'a>> {
        if query_vector.is_empty() || limit == 0 {
            return Vec::new();
        }
        let threshold = threshold.unwrap_or(self.threshold);
        let query_cluster = self.query_cluster(query_vector);
        let nodes = self.nodes;
        let boost = self.cluster_boost;

        let mut ranked: Vec<Ranked> = candidates
            .par_iter()
            .filter_map(|&position| {
                let node = nodes.get(position)?;
                if !node.active || node.embedding.len() != query_vector.len() {
                    return None;
                }
                let similarity = cosine_similarity(query_vector, &node.embedding);
                if similarity < threshold {
                    return None;
                }
                let shares_cluster =
                    query_cluster.is_some() && node.cluster.cluster_id == query_cluster;
                Some(Ranked {
                    position,
                    similarity,
                    score: if shares_cluster { similarity + boost } else { similarity },
                })
            })
            .collect();

        sort_ranked(&mut ranked, |i| nodes[i].id.as_str());
        ranked.truncate(limit);
        ranked
            .into_iter()
            .map(|r| ScoredNode {
                node: &nodes[r.position],
                similarity: r.similarity,
                score: r.score,
            })
            .collect()
    }

    fn query_cluster(&self, query_vector: &[f32]) -> Option<ClusterId> {
        self.clusters
            .and_then(|view| view.predict(query_vector).nearest_cluster())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::models::ClusterAssignment;
    use test_fixtures::{blend, make_node, tenant_scope, unit_vector, TEST_DIMS};

    fn corpus() -> Vec<InteractionNode> {
        vec![
            make_node("a1", "p", "r", tenant_scope("a"), unit_vector(TEST_DIMS, 0)),
            make_node("b1", "p", "r", tenant_scope("b"), unit_vector(TEST_DIMS, 0)),
            make_node("a2", "p", "r", tenant_scope("a"), blend(TEST_DIMS, &[(0, 1.0), (1, 1.0)])),
            make_node("a3", "p", "r", tenant_scope("a"), unit_vector(TEST_DIMS, 5)),
        ]
    }

    #[test]
    fn scope_is_applied_before_ranking() {
        let nodes = corpus();
        let config = RetrievalConfig::default();
        let retriever = InteractionRetriever::new(&nodes, &config);
        let scope = tenant_scope("a");
        let hits = retriever.retrieve(&unit_vector(TEST_DIMS, 0), 10, Some(&scope), None);
        let ids: Vec<_> = hits.iter().map(|h| h.node.id.as_str()).collect();
        assert_eq!(ids, ["a1", "a2"]);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn missing_scope_returns_nothing() {
        let nodes = corpus();
        let config = RetrievalConfig::default();
        let retriever = InteractionRetriever::new(&nodes, &config);
        assert!(retriever.retrieve(&unit_vector(TEST_DIMS, 0), 10, None, None).is_empty());
    }

    #[test]
    fn threshold_override_admits_weaker_matches() {
        let nodes = corpus();
        let config = RetrievalConfig::default();
        let retriever = InteractionRetriever::new(&nodes, &config);
        let scope = tenant_scope("a");
        let query = blend(TEST_DIMS, &[(1, 1.0), (0, 0.2)]);
        assert_eq!(retriever.retrieve(&query, 10, Some(&scope), None).len(), 1);
        assert_eq!(retriever.retrieve(&query, 10, Some(&scope), Some(0.1)).len(), 2);
    }

    #[test]
    fn inactive_nodes_are_skipped() {
        let mut nodes = corpus();
        nodes[0].active = false;
        let config = RetrievalConfig::default();
        let retriever = InteractionRetriever::new(&nodes, &config);
        let scope = tenant_scope("a");
        let hits = retriever.retrieve(&unit_vector(TEST_DIMS, 0), 10, Some(&scope), None);
        assert!(hits.iter().all(|h| h.node.id != "a1"));
    }

    #[test]
    fn cluster_boost_is_additive_for_shared_cluster() {
        use engram_clustering::{Centroid, ClusterView, Thresholds};
        use engram_core::config::ClusteringConfig;
        use std::sync::Arc;

        let mut nodes = corpus();
        nodes[2].cluster = ClusterAssignment {
            cluster_id: Some(7),
            ..ClusterAssignment::unassigned()
        };
        let view = ClusterView::new(
            Arc::new(Default::default()),
            Arc::new(vec![Centroid {
                cluster_id: 7,
                mean: unit_vector(TEST_DIMS, 0),
                members: 3,
                label: None,
            }]),
            Thresholds::from(&ClusteringConfig::default()),
        );
        let config = RetrievalConfig::default();
        let retriever = InteractionRetriever::new(&nodes, &config).with_clusters(&view);
        let scope = tenant_scope("a");
        let hits = retriever.retrieve(&unit_vector(TEST_DIMS, 0), 10, Some(&scope), None);
        let a2 = hits.iter().find(|h| h.node.id == "a2").unwrap();
        assert!((a2.score - a2.similarity - config.cluster_boost).abs() < 1e-9);
        let a1 = hits.iter().find(|h| h.node.id == "a1").unwrap();
        assert_eq!(a1.score, a1.similarity);
    }
}
