//! On-disk layout of the file backend.
//!
//! ```text
//! <root>/manifest.json
//! <root>/corpus/nodes.jsonl
//! <root>/corpus/episodes.jsonl
//! <root>/vectors/nodes.f32
//! <root>/vectors/episodes.f32
//! <root>/indexes/<name>.json
//! <root>/dedup/fingerprints.jsonl
//! ```

use std::path::{Path, PathBuf};

use engram_core::errors::EngramResult;
use engram_core::models::{IndexKind, RecordKind};

use crate::to_io_err;

#[derive(Debug, Clone)]
pub struct CorpusLayout {
    root: PathBuf,
}

impl CorpusLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create every area directory under the root.
    pub fn ensure_dirs(&self) -> EngramResult<()> {
        for dir in [
            self.root.clone(),
            self.root.join("corpus"),
            self.root.join("vectors"),
            self.root.join("indexes"),
            self.root.join("dedup"),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| to_io_err(&dir, e))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    pub fn records(&self, kind: RecordKind) -> PathBuf {
        self.root.join("corpus").join(format!("{}.jsonl", kind.as_str()))
    }

    pub fn vectors(&self, kind: RecordKind) -> PathBuf {
        self.root.join("vectors").join(format!("{}.f32", kind.as_str()))
    }

    pub fn index(&self, kind: IndexKind) -> PathBuf {
        self.root.join("indexes").join(format!("{}.json", kind.as_str()))
    }

    pub fn fingerprints(&self) -> PathBuf {
        self.root.join("dedup").join("fingerprints.jsonl")
    }
}
