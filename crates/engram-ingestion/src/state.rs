//! Writer-side corpus state.
//!
//! Owned by the ingestion worker. Records and indexes sit behind `Arc`s
//! shared with the published snapshot; a flush clones on write through
//! `Arc::make_mut`, so readers holding the old snapshot are never touched.

use std::collections::HashMap;
use std::sync::Arc;

use engram_clustering::StreamingClusterEngine;
use engram_core::models::{Episode, InteractionNode};
use engram_retrieval::{CorpusSnapshot, IvfIndex, KeywordIndex};

use crate::dedup::DedupGate;

pub struct CorpusState {
    pub version: u64,
    pub nodes: Arc<Vec<InteractionNode>>,
    pub episodes: Arc<Vec<Episode>>,
    pub keywords: Arc<KeywordIndex>,
    pub ann: Option<Arc<IvfIndex>>,
    pub clusters: StreamingClusterEngine,
    pub dedup: DedupGate,
    node_positions: HashMap<String, usize>,
    episode_positions: HashMap<String, usize>,
}

impl CorpusState {
    pub fn new(
        version: u64,
        nodes: Vec<InteractionNode>,
        episodes: Vec<Episode>,
        keywords: KeywordIndex,
        ann: Option<IvfIndex>,
        clusters: StreamingClusterEngine,
        dedup: DedupGate,
    ) -> Self {
        let node_positions = positions(nodes.iter().map(|n| n.id.as_str()));
        let episode_positions = positions(episodes.iter().map(|e| e.id.as_str()));
        Self {
            version,
            nodes: Arc::new(nodes),
            episodes: Arc::new(episodes),
            keywords: Arc::new(keywords),
            ann: ann.map(Arc::new),
            clusters,
            dedup,
            node_positions,
            episode_positions,
        }
    }

    pub fn empty(clusters: StreamingClusterEngine) -> Self {
        Self::new(
            0,
            Vec::new(),
            Vec::new(),
            KeywordIndex::new(),
            None,
            clusters,
            DedupGate::new(),
        )
    }

    pub fn node(&self, id: &str) -> Option<&InteractionNode> {
        self.node_positions.get(id).map(|&i| &self.nodes[i])
    }

    pub fn node_position(&self, id: &str) -> Option<usize> {
        self.node_positions.get(id).copied()
    }

    pub fn episode_position(&self, id: &str) -> Option<usize> {
        self.episode_positions.get(id).copied()
    }

    /// Active nodes of one conversation, in sequence order.
    pub fn conversation_nodes(&self, conversation_id: &str) -> Vec<&InteractionNode> {
        let mut members: Vec<&InteractionNode> = self
            .nodes
            .iter()
            .filter(|n| n.active && n.conversation_id == conversation_id)
            .collect();
        members.sort_by(|a, b| a.sequence.cmp(&b.sequence).then(a.created_at.cmp(&b.created_at)));
        members
    }

    /// Whether an active episode already covers the conversation.
    pub fn has_episode_for(&self, conversation_id: &str) -> bool {
        self.episodes
            .iter()
            .any(|e| e.active && e.conversation_id == conversation_id)
    }

    pub fn push_nodes(&mut self, new_nodes: Vec<InteractionNode>) {
        let nodes = Arc::make_mut(&mut self.nodes);
        for node in new_nodes {
            self.node_positions.insert(node.id.clone(), nodes.len());
            nodes.push(node);
        }
    }

    pub fn push_episode(&mut self, episode: Episode) {
        let episodes = Arc::make_mut(&mut self.episodes);
        self.episode_positions.insert(episode.id.clone(), episodes.len());
        episodes.push(episode);
    }

    pub fn nodes_mut(&mut self) -> &mut Vec<InteractionNode> {
        Arc::make_mut(&mut self.nodes)
    }

    pub fn episodes_mut(&mut self) -> &mut Vec<Episode> {
        Arc::make_mut(&mut self.episodes)
    }

    pub fn keywords_mut(&mut self) -> &mut KeywordIndex {
        Arc::make_mut(&mut self.keywords)
    }

    /// Immutable snapshot of the current state.
    pub fn snapshot(&self) -> CorpusSnapshot {
        CorpusSnapshot::new(
            self.version,
            Arc::clone(&self.nodes),
            Arc::clone(&self.episodes),
            Arc::clone(&self.keywords),
            self.ann.clone(),
            self.clusters.view(),
        )
    }
}

fn positions<'a>(ids: impl Iterator<Item = &'a str>) -> HashMap<String, usize> {
    ids.enumerate().map(|(i, id)| (id.to_string(), i)).collect()
}
