//! Startup integrity checks.
//!
//! Records are the source of truth. Everything derived from them (vector
//! rows, the keyword index, the fingerprint set, cluster state, the ANN
//! index) is checked on load and rebuilt from the records when it
//! disagrees. Only a dimension mismatch between the stored corpus and the
//! configured embedder is fatal.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use engram_clustering::similarity::normalized_mean;
use engram_clustering::{compute_retrain, ClusterState, RetrainInput, StreamingClusterEngine};
use engram_core::config::EngramConfig;
use engram_core::errors::{ConsistencyError, EngramError, EngramResult};
use engram_core::models::{ClusterId, Episode, IndexKind, InteractionNode, Manifest, RecordKind};
use engram_core::traits::{ICorpusStorage, IEmbeddingProvider};
use engram_ingestion::{CorpusState, DedupGate};
use engram_observability::tracing_setup::events;
use engram_observability::EngineMetrics;
use engram_retrieval::{IvfIndex, KeywordIndex};

/// One derived structure rebuilt at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexRebuild {
    pub index: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub corpus_version: u64,
    pub nodes: usize,
    pub episodes: usize,
    pub rebuilt: Vec<IndexRebuild>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.rebuilt.is_empty()
    }

    pub fn rebuilt(&self, index: &str) -> bool {
        self.rebuilt.iter().any(|r| r.index == index)
    }
}

/// Refuse a corpus written with another vector dimension.
pub fn check_dimensions(manifest: &Manifest, configured: usize) -> EngramResult<()> {
    match manifest.dimensions {
        Some(stored) if stored != configured => Err(ConsistencyError::CorpusDimensionMismatch {
            stored,
            configured,
        }
        .into()),
        _ => Ok(()),
    }
}

/// Load the corpus, repairing derived structures as needed.
pub fn load_verified(
    storage: &dyn ICorpusStorage,
    embedder: &dyn IEmbeddingProvider,
    config: &EngramConfig,
    metrics: &EngineMetrics,
) -> EngramResult<(CorpusState, IntegrityReport)> {
    let _span = engram_observability::storage_span!(storage.backend_name(), "verify").entered();
    check_dimensions(&storage.manifest()?, config.embedding.dimensions)?;

    let mut checker = Checker {
        storage,
        embedder,
        config,
        metrics,
        report: IntegrityReport::default(),
    };
    let nodes = checker.nodes()?;
    let episodes = checker.episodes(&nodes)?;
    let keywords = checker.keywords(&nodes)?;
    let dedup = checker.dedup(&nodes)?;
    let (clusters, nodes) = checker.clusters(nodes)?;
    let ann = checker.ann(&episodes)?;

    let version = storage.manifest()?.corpus_version;
    let mut report = checker.report;
    report.corpus_version = version;
    report.nodes = nodes.len();
    report.episodes = episodes.len();
    tracing::info!(
        nodes = report.nodes,
        episodes = report.episodes,
        corpus_version = version,
        rebuilt = report.rebuilt.len(),
        "corpus loaded"
    );

    let state = CorpusState::new(version, nodes, episodes, keywords, ann, clusters, dedup);
    Ok((state, report))
}

struct Checker<'a> {
    storage: &'a dyn ICorpusStorage,
    embedder: &'a dyn IEmbeddingProvider,
    config: &'a EngramConfig,
    metrics: &'a EngineMetrics,
    report: IntegrityReport,
}

impl Checker<'_> {
    fn rebuilt(&mut self, index: &str, reason: &str) {
        tracing::warn!(index, reason, "derived index disagreed with the corpus");
        events::index_rebuilt(index, reason);
        self.metrics.ingestion.record_index_rebuild();
        self.report.rebuilt.push(IndexRebuild {
            index: index.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Nodes with vectors. Missing vector rows are re-embedded from the
    /// record text.
    fn nodes(&mut self) -> EngramResult<Vec<InteractionNode>> {
        let err = match self.storage.load_nodes() {
            Err(EngramError::ConsistencyError(e @ ConsistencyError::VectorRowMissing { .. })) => e,
            other => return other,
        };
        let records = self.storage.load_node_records()?;
        let mut rows = self.storage.read_vectors(RecordKind::Node)?;
        rows.truncate(records.len());
        let texts: Vec<String> = records[rows.len()..].iter().map(InteractionNode::text).collect();
        for vector in self.embedder.embed_batch(&texts) {
            rows.push(vector?);
        }
        self.storage.write_vectors(RecordKind::Node, &rows)?;
        self.rebuilt("node_vectors", &err.to_string());
        self.storage.load_nodes()
    }

    /// Episodes with vectors. A missing row is recomputed as the mean of
    /// the member node vectors.
    fn episodes(&mut self, nodes: &[InteractionNode]) -> EngramResult<Vec<Episode>> {
        let err = match self.storage.load_episodes() {
            Err(EngramError::ConsistencyError(e @ ConsistencyError::VectorRowMissing { .. })) => e,
            other => return other,
        };
        let by_id: HashMap<&str, &InteractionNode> =
            nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let dims = self.config.embedding.dimensions;
        let records = self.storage.load_episode_records()?;
        let mut rows = self.storage.read_vectors(RecordKind::Episode)?;
        rows.truncate(records.len());
        for episode in &records[rows.len()..] {
            let mean = normalized_mean(
                episode
                    .node_ids
                    .iter()
                    .filter_map(|id| by_id.get(id.as_str()))
                    .map(|n| n.embedding.as_slice()),
            );
            rows.push(if mean.len() == dims { mean } else { vec![0.0; dims] });
        }
        self.storage.write_vectors(RecordKind::Episode, &rows)?;
        self.rebuilt("episode_vectors", &err.to_string());
        self.storage.load_episodes()
    }

    fn keywords(&mut self, nodes: &[InteractionNode]) -> EngramResult<KeywordIndex> {
        let kind = IndexKind::Keywords;
        let problem = match self.storage.read_index(kind)? {
            None if nodes.is_empty() => return Ok(KeywordIndex::new()),
            None => "index missing".to_string(),
            Some(bytes) => match KeywordIndex::from_bytes(&bytes) {
                Err(e) => e.to_string(),
                Ok(index) if index.len() != nodes.len() => ConsistencyError::IndexOutOfSync {
                    index: kind.as_str().to_string(),
                    indexed: index.len(),
                    corpus: nodes.len(),
                }
                .to_string(),
                Ok(index) => match nodes.iter().find(|n| !index.contains(&n.id)) {
                    Some(node) => format!("node {} is not indexed", node.id),
                    None => return Ok(index),
                },
            },
        };

        let texts: Vec<String> = nodes.iter().map(InteractionNode::text).collect();
        let index = KeywordIndex::build(
            nodes
                .iter()
                .zip(&texts)
                .map(|(n, text)| (n.id.as_str(), text.as_str())),
        );
        self.storage.write_index(kind, &index.to_bytes()?)?;
        self.rebuilt(kind.as_str(), &problem);
        Ok(index)
    }

    fn dedup(&mut self, nodes: &[InteractionNode]) -> EngramResult<DedupGate> {
        let fingerprints = self.storage.load_fingerprints()?;
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let gate = DedupGate::restore(ids.iter().copied(), &fingerprints);

        let dangling = gate
            .dangling(&ids)
            .next()
            .map(|(fingerprint, node_id)| (fingerprint.to_string(), node_id.to_string()));
        let problem = if let Some((fingerprint, node_id)) = dangling {
            ConsistencyError::DanglingFingerprint {
                fingerprint: fingerprint.to_string(),
                node_id: node_id.to_string(),
            }
            .to_string()
        } else if fingerprints.len() != nodes.len() {
            ConsistencyError::IndexOutOfSync {
                index: "fingerprints".to_string(),
                indexed: fingerprints.len(),
                corpus: nodes.len(),
            }
            .to_string()
        } else {
            return Ok(gate);
        };

        let gate = DedupGate::rebuild_from(nodes);
        self.storage.replace_fingerprints(&gate.fingerprints())?;
        self.rebuilt("fingerprints", &problem);
        Ok(gate)
    }

    /// Cluster state, checked against the vectors and the assignments the
    /// nodes carry. A rebuild retrains over the whole corpus and rewrites
    /// every node's assignment.
    fn clusters(
        &mut self,
        mut nodes: Vec<InteractionNode>,
    ) -> EngramResult<(StreamingClusterEngine, Vec<InteractionNode>)> {
        let kind = IndexKind::Clusters;
        let config = self.config.clustering.clone();
        let dims = self.config.embedding.dimensions;

        let problem = match self.storage.read_index(kind)? {
            None if nodes.is_empty() => return Ok((StreamingClusterEngine::new(config), nodes)),
            None => "index missing".to_string(),
            Some(bytes) => match ClusterState::from_bytes(&bytes) {
                Err(e) => e.to_string(),
                Ok(state) => match state.dimensions() {
                    Some(d) if d != dims => {
                        format!("cluster state holds {d}-d vectors, corpus is {dims}-d")
                    }
                    _ => {
                        let known: HashSet<ClusterId> = state
                            .centroids
                            .iter()
                            .map(|c| c.cluster_id)
                            .chain(state.model.clusters.iter().map(|c| c.id))
                            .collect();
                        let unknown = nodes
                            .iter()
                            .filter_map(|n| n.cluster.cluster_id)
                            .find(|id| !known.contains(id));
                        match unknown {
                            Some(id) => format!("nodes reference unknown cluster {id}"),
                            None => {
                                return Ok((StreamingClusterEngine::from_state(config, state), nodes))
                            }
                        }
                    }
                },
            },
        };

        let mut engine = StreamingClusterEngine::new(config);
        let inputs: Vec<RetrainInput<'_>> = nodes
            .iter()
            .filter(|n| n.active)
            .map(|n| RetrainInput {
                node_id: &n.id,
                vector: &n.embedding,
                text: &n.prompt,
            })
            .collect();
        let outcome = compute_retrain(&inputs, &[], engine.next_id(), engine.config())?;
        engine.install(&outcome);

        let assignments: HashMap<&str, _> = outcome
            .assignments
            .iter()
            .map(|(id, a)| (id.as_str(), a))
            .collect();
        for node in &mut nodes {
            node.cluster = assignments
                .get(node.id.as_str())
                .map(|a| (*a).clone())
                .unwrap_or_default();
        }
        self.storage.update_nodes(&nodes)?;
        self.storage.write_index(kind, &engine.to_state().to_bytes()?)?;
        self.rebuilt(kind.as_str(), &problem);
        Ok((engine, nodes))
    }

    fn ann(&mut self, episodes: &[Episode]) -> EngramResult<Option<IvfIndex>> {
        let retrieval = &self.config.retrieval;
        if !retrieval.ann_enabled || episodes.len() < retrieval.ann_min_episodes {
            return Ok(None);
        }
        let kind = IndexKind::Ann;
        let dims = self.config.embedding.dimensions;
        let problem = match self.storage.read_index(kind)? {
            None => "index missing".to_string(),
            Some(bytes) => match IvfIndex::from_bytes(&bytes) {
                Err(e) => e.to_string(),
                Ok(index) if index.indexed() > episodes.len() => ConsistencyError::IndexOutOfSync {
                    index: kind.as_str().to_string(),
                    indexed: index.indexed(),
                    corpus: episodes.len(),
                }
                .to_string(),
                Ok(index) if index.dimensions() != dims => {
                    format!("ann index holds {}-d vectors, corpus is {dims}-d", index.dimensions())
                }
                Ok(index) if index.is_stale(episodes.len(), retrieval.ann_stale_ratio) => {
                    "episode count outgrew the index".to_string()
                }
                Ok(index) => return Ok(Some(index)),
            },
        };

        let vectors: Vec<&[f32]> = episodes.iter().map(|e| e.embedding.as_slice()).collect();
        let Some(index) = IvfIndex::build(&vectors, retrieval.ann_lists) else {
            return Ok(None);
        };
        self.storage.write_index(kind, &index.to_bytes()?)?;
        self.rebuilt(kind.as_str(), &problem);
        Ok(Some(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_is_fatal() {
        let mut manifest = Manifest::default();
        assert!(check_dimensions(&manifest, 64).is_ok());
        manifest.dimensions = Some(64);
        assert!(check_dimensions(&manifest, 64).is_ok());
        let err = check_dimensions(&manifest, 128).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn report_names_rebuilt_indexes() {
        let mut report = IntegrityReport::default();
        assert!(report.is_clean());
        report.rebuilt.push(IndexRebuild {
            index: "keywords".into(),
            reason: "index missing".into(),
        });
        assert!(report.rebuilt("keywords"));
        assert!(!report.rebuilt("clusters"));
    }
}
