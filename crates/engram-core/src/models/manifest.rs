use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::CORPUS_FORMAT_VERSION;

/// The two record kinds held by the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Node,
    Episode,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Node => "nodes",
            Self::Episode => "episodes",
        }
    }
}

/// Derived indexes persisted next to the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Clusters,
    Keywords,
    Ann,
}

impl IndexKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clusters => "clusters",
            Self::Keywords => "keywords",
            Self::Ann => "ann",
        }
    }
}

/// Corpus version and record counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    /// Incremented on every committed write.
    pub corpus_version: u64,
    pub node_count: usize,
    pub episode_count: usize,
    /// Vector dimensionality, fixed by the first write.
    pub dimensions: Option<usize>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            format_version: CORPUS_FORMAT_VERSION,
            corpus_version: 0,
            node_count: 0,
            episode_count: 0,
            dimensions: None,
            updated_at: Utc::now(),
        }
    }
}

/// A content fingerprint and the node that first recorded it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub hash: String,
    pub node_id: String,
}
