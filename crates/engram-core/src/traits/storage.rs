use crate::errors::EngramResult;
use crate::models::{
    AuthScope, Episode, Fingerprint, IndexKind, InteractionNode, Manifest, RecordKind,
};

/// Corpus store: append-only records, index-aligned vectors, derived
/// indexes, and the dedup fingerprint set. Retrieval and ingestion only
/// ever talk to this trait, never to a concrete backend.
pub trait ICorpusStorage: Send + Sync {
    fn manifest(&self) -> EngramResult<Manifest>;

    /// Append nodes in order, each with its vector row.
    fn append_nodes(&self, nodes: &[InteractionNode]) -> EngramResult<()>;
    fn append_episodes(&self, episodes: &[Episode]) -> EngramResult<()>;

    fn get_node(&self, id: &str) -> EngramResult<Option<InteractionNode>>;
    fn get_episode(&self, id: &str) -> EngramResult<Option<Episode>>;

    /// Every node in append order, vectors attached.
    fn load_nodes(&self) -> EngramResult<Vec<InteractionNode>>;
    /// Every episode in append order, vectors attached.
    fn load_episodes(&self) -> EngramResult<Vec<Episode>>;

    /// Node records without their vectors, used to repair the vectors area.
    fn load_node_records(&self) -> EngramResult<Vec<InteractionNode>>;
    fn load_episode_records(&self) -> EngramResult<Vec<Episode>>;

    /// Nodes visible to `scope`, in append order, vectors attached.
    fn list_nodes_by_scope(&self, scope: &AuthScope) -> EngramResult<Vec<InteractionNode>>;

    /// The vector array for one record kind, row-aligned with the records.
    fn read_vectors(&self, kind: RecordKind) -> EngramResult<Vec<Vec<f32>>>;
    /// Replace the vector array for one record kind.
    fn write_vectors(&self, kind: RecordKind, rows: &[Vec<f32>]) -> EngramResult<()>;

    /// Rewrite mutable fields (cluster, telemetry, active flag) of existing nodes.
    fn update_nodes(&self, nodes: &[InteractionNode]) -> EngramResult<()>;
    fn update_episodes(&self, episodes: &[Episode]) -> EngramResult<()>;

    fn read_index(&self, kind: IndexKind) -> EngramResult<Option<Vec<u8>>>;
    fn write_index(&self, kind: IndexKind, payload: &[u8]) -> EngramResult<()>;

    fn load_fingerprints(&self) -> EngramResult<Vec<Fingerprint>>;
    fn append_fingerprints(&self, fingerprints: &[Fingerprint]) -> EngramResult<()>;
    /// Replace the whole fingerprint set, used after a rebuild.
    fn replace_fingerprints(&self, fingerprints: &[Fingerprint]) -> EngramResult<()>;

    fn backend_name(&self) -> &str;
}
