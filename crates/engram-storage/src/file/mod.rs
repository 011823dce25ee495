//! Flat-file corpus store: JSON-lines records, binary vector arrays and JSON
//! indexes under one directory. The whole corpus is mirrored in memory;
//! every write goes to disk before the mirror changes.

pub mod io;
pub mod layout;
pub mod record_area;

use std::path::Path;
use std::sync::RwLock;

use chrono::Utc;

use engram_core::errors::EngramResult;
use engram_core::models::{
    AuthScope, Episode, Fingerprint, IndexKind, InteractionNode, Manifest, RecordKind,
};
use engram_core::traits::ICorpusStorage;
use engram_observability::storage_span;

use crate::validation;
use crate::{poisoned, to_io_err};

pub use layout::CorpusLayout;
use crate::record::StoredRecord;
use record_area::RecordArea;

const BACKEND: &str = "file";

struct FileState {
    manifest: Manifest,
    nodes: RecordArea<InteractionNode>,
    episodes: RecordArea<Episode>,
    fingerprints: Vec<Fingerprint>,
}

pub struct FileCorpusStore {
    layout: CorpusLayout,
    state: RwLock<FileState>,
}

impl FileCorpusStore {
    /// Open (or create) a corpus directory.
    pub fn open(root: &Path) -> EngramResult<Self> {
        let _span = storage_span!(BACKEND, "open").entered();
        let layout = CorpusLayout::new(root);
        layout.ensure_dirs()?;

        let manifest_path = layout.manifest();
        let mut manifest: Manifest = match std::fs::read(&manifest_path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Manifest::default(),
            Err(e) => return Err(to_io_err(&manifest_path, e)),
        };

        let (nodes, node_dims) = RecordArea::<InteractionNode>::load(&layout)?;
        let (episodes, episode_dims) = RecordArea::<Episode>::load(&layout)?;
        let fp_path = layout.fingerprints();
        let fingerprints = io::decode_lines(&fp_path, &io::read_or_empty(&fp_path)?)?;

        // Records are the source of truth for counts.
        manifest.node_count = nodes.len();
        manifest.episode_count = episodes.len();
        if manifest.dimensions.is_none() {
            manifest.dimensions = node_dims.or(episode_dims);
        }

        tracing::debug!(
            root = %root.display(),
            nodes = nodes.len(),
            episodes = episodes.len(),
            version = manifest.corpus_version,
            "file corpus loaded"
        );
        Ok(Self {
            layout,
            state: RwLock::new(FileState {
                manifest,
                nodes,
                episodes,
                fingerprints,
            }),
        })
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    fn read<T>(&self, f: impl FnOnce(&FileState) -> EngramResult<T>) -> EngramResult<T> {
        let guard = self.state.read().map_err(|_| poisoned("file corpus"))?;
        f(&guard)
    }

    /// Run a write against the state, then bump and persist the manifest.
    fn write<T>(&self, f: impl FnOnce(&mut FileState) -> EngramResult<T>) -> EngramResult<T> {
        let mut guard = self.state.write().map_err(|_| poisoned("file corpus"))?;
        let out = f(&mut guard)?;
        let state = &mut *guard;
        state.manifest.node_count = state.nodes.len();
        state.manifest.episode_count = state.episodes.len();
        state.manifest.corpus_version += 1;
        state.manifest.updated_at = Utc::now();
        io::write_atomic(
            &self.layout.manifest(),
            &serde_json::to_vec_pretty(&state.manifest)?,
        )?;
        Ok(out)
    }

    fn append<T: StoredRecord>(
        &self,
        batch: &[T],
        area: impl FnOnce(&mut FileState) -> &mut RecordArea<T>,
    ) -> EngramResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let _span = storage_span!(BACKEND, "append").entered();
        let layout = &self.layout;
        self.write(|state| {
            let dims = validation::check_rows(
                state.manifest.dimensions,
                batch.iter().map(|r| (r.id(), r.vector())),
            )?;
            let d = dims.unwrap_or_default();
            area(state).append(layout, d, batch)?;
            state.manifest.dimensions = dims;
            Ok(())
        })
    }
}

impl ICorpusStorage for FileCorpusStore {
    fn manifest(&self) -> EngramResult<Manifest> {
        self.read(|s| Ok(s.manifest.clone()))
    }

    fn append_nodes(&self, nodes: &[InteractionNode]) -> EngramResult<()> {
        self.append(nodes, |s| &mut s.nodes)
    }

    fn append_episodes(&self, episodes: &[Episode]) -> EngramResult<()> {
        self.append(episodes, |s| &mut s.episodes)
    }

    fn get_node(&self, id: &str) -> EngramResult<Option<InteractionNode>> {
        self.read(|s| s.nodes.get(id))
    }

    fn get_episode(&self, id: &str) -> EngramResult<Option<Episode>> {
        self.read(|s| s.episodes.get(id))
    }

    fn load_nodes(&self) -> EngramResult<Vec<InteractionNode>> {
        self.read(|s| s.nodes.load_where(|_| true))
    }

    fn load_episodes(&self) -> EngramResult<Vec<Episode>> {
        self.read(|s| s.episodes.load_where(|_| true))
    }

    fn load_node_records(&self) -> EngramResult<Vec<InteractionNode>> {
        self.read(|s| Ok(s.nodes.records().to_vec()))
    }

    fn load_episode_records(&self) -> EngramResult<Vec<Episode>> {
        self.read(|s| Ok(s.episodes.records().to_vec()))
    }

    fn list_nodes_by_scope(&self, scope: &AuthScope) -> EngramResult<Vec<InteractionNode>> {
        self.read(|s| s.nodes.load_where(|n| n.scope.overlaps(scope)))
    }

    fn read_vectors(&self, kind: RecordKind) -> EngramResult<Vec<Vec<f32>>> {
        self.read(|s| {
            Ok(match kind {
                RecordKind::Node => s.nodes.vectors().to_vec(),
                RecordKind::Episode => s.episodes.vectors().to_vec(),
            })
        })
    }

    fn write_vectors(&self, kind: RecordKind, rows: &[Vec<f32>]) -> EngramResult<()> {
        let _span = storage_span!(BACKEND, "write_vectors").entered();
        let layout = &self.layout;
        self.write(|state| {
            let dims = validation::check_array(state.manifest.dimensions, rows)?;
            let d = dims.unwrap_or_default();
            match kind {
                RecordKind::Node => state.nodes.replace_vectors(layout, d, rows)?,
                RecordKind::Episode => state.episodes.replace_vectors(layout, d, rows)?,
            }
            state.manifest.dimensions = dims;
            Ok(())
        })
    }

    fn update_nodes(&self, nodes: &[InteractionNode]) -> EngramResult<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        let layout = &self.layout;
        self.write(|state| state.nodes.update(layout, nodes))
    }

    fn update_episodes(&self, episodes: &[Episode]) -> EngramResult<()> {
        if episodes.is_empty() {
            return Ok(());
        }
        let layout = &self.layout;
        self.write(|state| state.episodes.update(layout, episodes))
    }

    fn read_index(&self, kind: IndexKind) -> EngramResult<Option<Vec<u8>>> {
        // Held for reading so a concurrent rewrite is never observed midway.
        self.read(|_| {
            let bytes = io::read_or_empty(&self.layout.index(kind))?;
            Ok((!bytes.is_empty()).then_some(bytes))
        })
    }

    fn write_index(&self, kind: IndexKind, payload: &[u8]) -> EngramResult<()> {
        let _span = storage_span!(BACKEND, "write_index").entered();
        let path = self.layout.index(kind);
        self.write(|_| io::write_atomic(&path, payload))
    }

    fn load_fingerprints(&self) -> EngramResult<Vec<Fingerprint>> {
        self.read(|s| Ok(s.fingerprints.clone()))
    }

    fn append_fingerprints(&self, fingerprints: &[Fingerprint]) -> EngramResult<()> {
        if fingerprints.is_empty() {
            return Ok(());
        }
        let path = self.layout.fingerprints();
        self.write(|state| {
            io::append_bytes(&path, &io::encode_lines(fingerprints)?)?;
            state.fingerprints.extend_from_slice(fingerprints);
            Ok(())
        })
    }

    fn replace_fingerprints(&self, fingerprints: &[Fingerprint]) -> EngramResult<()> {
        let path = self.layout.fingerprints();
        self.write(|state| {
            io::write_atomic(&path, &io::encode_lines(fingerprints)?)?;
            state.fingerprints = fingerprints.to_vec();
            Ok(())
        })
    }

    fn backend_name(&self) -> &str {
        BACKEND
    }
}
