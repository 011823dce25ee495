//! Record and config builders.

use std::path::Path;

use chrono::{DateTime, Utc};
use engram_core::config::{EngramConfig, StorageBackend};
use engram_core::fingerprint::content_fingerprint;
use engram_core::models::{
    AccessTelemetry, AuthScope, ClusterAssignment, Episode, InteractionNode, Origin,
    SignalBundle, TagSet,
};

/// Dimensionality used throughout the test suites.
pub const TEST_DIMS: usize = 64;

pub fn tenant_scope(tenant: &str) -> AuthScope {
    AuthScope::tenant(tenant).expect("non-empty tenant")
}

pub fn owner_scope(owner: &str) -> AuthScope {
    AuthScope::owner(owner).expect("non-empty owner")
}

pub fn scope_of(owner: Option<&str>, tenant: Option<&str>) -> AuthScope {
    AuthScope::new(owner, tenant).expect("at least one identifier")
}

/// Unit vector along `axis`.
pub fn unit_vector(dims: usize, axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; dims];
    v[axis % dims] = 1.0;
    v
}

/// Normalized weighted sum of axis vectors.
pub fn blend(dims: usize, parts: &[(usize, f32)]) -> Vec<f32> {
    let mut v = vec![0.0f32; dims];
    for (axis, weight) in parts {
        v[axis % dims] += weight;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

/// A node with default signals and no cluster.
pub fn make_node(
    id: &str,
    prompt: &str,
    response: &str,
    scope: AuthScope,
    embedding: Vec<f32>,
) -> InteractionNode {
    InteractionNode {
        id: id.to_string(),
        conversation_id: format!("conv-{id}"),
        sequence: 0,
        prompt: prompt.to_string(),
        response: response.to_string(),
        created_at: Utc::now(),
        embedding,
        scope,
        signals: SignalBundle::default(),
        tags: TagSet::default(),
        cluster: ClusterAssignment::unassigned(),
        access: AccessTelemetry::default(),
        active: true,
        origin: Origin::Conversation,
        content_hash: content_fingerprint(prompt, response),
    }
}

/// Same as [`make_node`] with an explicit timestamp.
pub fn make_node_at(
    id: &str,
    prompt: &str,
    scope: AuthScope,
    embedding: Vec<f32>,
    created_at: DateTime<Utc>,
) -> InteractionNode {
    let mut node = make_node(id, prompt, "", scope, embedding);
    node.created_at = created_at;
    node
}

pub fn make_episode(
    id: &str,
    conversation_id: &str,
    scope: AuthScope,
    node_ids: &[&str],
    embedding: Vec<f32>,
) -> Episode {
    Episode {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        scope,
        node_ids: node_ids.iter().map(|s| s.to_string()).collect(),
        created_at: Utc::now(),
        embedding,
        tags: TagSet::default(),
        summary: None,
        active: true,
    }
}

/// Config for tests: hashed provider, small dimensions, short timers.
pub fn test_config(data_dir: &Path, backend: StorageBackend) -> EngramConfig {
    let mut config = EngramConfig::default();
    config.storage.backend = backend;
    config.storage.data_dir = data_dir.to_path_buf();
    config.embedding.provider = "hashed".to_string();
    config.embedding.dimensions = TEST_DIMS;
    config.embedding.l2_cache_enabled = false;
    config.embedding.initial_backoff_ms = 1;
    config.embedding.max_backoff_ms = 2;
    config.ingestion.flush_interval_ms = 50;
    config.retrieval.query_timeout_ms = 5_000;
    config
}
