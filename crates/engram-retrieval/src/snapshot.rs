//! Immutable corpus snapshots.
//!
//! Query workers clone the current `Arc<CorpusSnapshot>` and work on it
//! without locks. The ingestion worker builds the next snapshot after a
//! flush has committed and swaps it in with one pointer store, so a reader
//! sees the whole pre-flush state or the whole post-flush state.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use engram_clustering::ClusterView;
use engram_core::config::ClusteringConfig;
use engram_core::models::{AuthScope, Episode, InteractionNode};

use crate::keyword::KeywordIndex;
use crate::vector::IvfIndex;

/// Node positions per owner and per tenant.
#[derive(Debug, Clone, Default)]
pub struct ScopeIndex {
    by_owner: HashMap<String, Vec<usize>>,
    by_tenant: HashMap<String, Vec<usize>>,
}

impl ScopeIndex {
    pub fn build(nodes: &[InteractionNode]) -> Self {
        let mut index = Self::default();
        for (position, node) in nodes.iter().enumerate() {
            if let Some(owner) = node.scope.owner_id() {
                index.by_owner.entry(owner.to_string()).or_default().push(position);
            }
            if let Some(tenant) = node.scope.tenant_id() {
                index.by_tenant.entry(tenant.to_string()).or_default().push(position);
            }
        }
        index
    }

    /// Ascending positions of every node whose scope overlaps `scope`.
    pub fn visible(&self, scope: &AuthScope) -> Vec<usize> {
        let owned = scope
            .owner_id()
            .and_then(|o| self.by_owner.get(o))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let tenanted = scope
            .tenant_id()
            .and_then(|t| self.by_tenant.get(t))
            .map(Vec::as_slice)
            .unwrap_or_default();

        // Both lists are ascending: merge without duplicates.
        let mut out = Vec::with_capacity(owned.len() + tenanted.len());
        let (mut i, mut j) = (0, 0);
        while i < owned.len() || j < tenanted.len() {
            let next = match (owned.get(i), tenanted.get(j)) {
                (Some(&a), Some(&b)) if a == b => {
                    i += 1;
                    j += 1;
                    a
                }
                (Some(&a), Some(&b)) if a < b => {
                    i += 1;
                    a
                }
                (Some(_), Some(&b)) => {
                    j += 1;
                    b
                }
                (Some(&a), None) => {
                    i += 1;
                    a
                }
                (None, Some(&b)) => {
                    j += 1;
                    b
                }
                (None, None) => break,
            };
            out.push(next);
        }
        out
    }
}

/// One consistent version of the corpus and every derived index.
#[derive(Debug, Clone)]
pub struct CorpusSnapshot {
    version: u64,
    nodes: Arc<Vec<InteractionNode>>,
    episodes: Arc<Vec<Episode>>,
    positions: HashMap<String, usize>,
    scopes: ScopeIndex,
    keywords: Arc<KeywordIndex>,
    ann: Option<Arc<IvfIndex>>,
    clusters: ClusterView,
}

impl CorpusSnapshot {
    pub fn new(
        version: u64,
        nodes: Arc<Vec<InteractionNode>>,
        episodes: Arc<Vec<Episode>>,
        keywords: Arc<KeywordIndex>,
        ann: Option<Arc<IvfIndex>>,
        clusters: ClusterView,
    ) -> Self {
        let positions = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        let scopes = ScopeIndex::build(&nodes);
        Self {
            version,
            nodes,
            episodes,
            positions,
            scopes,
            keywords,
            ann,
            clusters,
        }
    }

    pub fn empty(config: &ClusteringConfig) -> Self {
        Self::new(
            0,
            Arc::new(Vec::new()),
            Arc::new(Vec::new()),
            Arc::new(KeywordIndex::new()),
            None,
            ClusterView::empty(config),
        )
    }

    /// Corpus version this snapshot was built from.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn nodes(&self) -> &[InteractionNode] {
        &self.nodes
    }

    pub fn shared_nodes(&self) -> Arc<Vec<InteractionNode>> {
        Arc::clone(&self.nodes)
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn shared_episodes(&self) -> Arc<Vec<Episode>> {
        Arc::clone(&self.episodes)
    }

    pub fn keywords(&self) -> &KeywordIndex {
        &self.keywords
    }

    pub fn shared_keywords(&self) -> Arc<KeywordIndex> {
        Arc::clone(&self.keywords)
    }

    pub fn ann(&self) -> Option<&IvfIndex> {
        self.ann.as_deref()
    }

    pub fn shared_ann(&self) -> Option<Arc<IvfIndex>> {
        self.ann.clone()
    }

    pub fn clusters(&self) -> &ClusterView {
        &self.clusters
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&InteractionNode> {
        self.position(id).map(|i| &self.nodes[i])
    }

    /// Positions of active nodes visible to `scope`, ascending. This is the
    /// only way the query path reaches node records.
    pub fn visible_nodes(&self, scope: &AuthScope) -> Vec<usize> {
        self.scopes
            .visible(scope)
            .into_iter()
            .filter(|&i| self.nodes[i].active)
            .collect()
    }
}

/// Holder of the current snapshot.
#[derive(Debug)]
pub struct SnapshotCell {
    current: RwLock<Arc<CorpusSnapshot>>,
}

impl SnapshotCell {
    pub fn new(snapshot: CorpusSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The current snapshot. Holding it never blocks a swap.
    pub fn load(&self) -> Arc<CorpusSnapshot> {
        // A panicking writer cannot leave a half-stored Arc behind.
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn store(&self, snapshot: Arc<CorpusSnapshot>) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = snapshot;
    }

    pub fn version(&self) -> u64 {
        self.load().version()
    }
}
