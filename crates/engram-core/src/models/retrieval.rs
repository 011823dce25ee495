use std::fmt;

use serde::{Deserialize, Serialize};

/// Which lanes a retrieval call runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    #[default]
    Fused,
    VectorOnly,
    KeywordOnly,
}

/// An independent ranking lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Semantic,
    Keyword,
}

impl Lane {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Keyword => "keyword",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-lane ranks (1-based) that contributed to a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Provenance {
    pub semantic_rank: Option<usize>,
    pub keyword_rank: Option<usize>,
}

impl Provenance {
    pub fn rank(&self, lane: Lane) -> Option<usize> {
        match lane {
            Lane::Semantic => self.semantic_rank,
            Lane::Keyword => self.keyword_rank,
        }
    }

    pub fn set_rank(&mut self, lane: Lane, rank: usize) {
        match lane {
            Lane::Semantic => self.semantic_rank = Some(rank),
            Lane::Keyword => self.keyword_rank = Some(rank),
        }
    }

    pub fn lanes(&self) -> Vec<Lane> {
        let mut lanes = Vec::with_capacity(2);
        if self.semantic_rank.is_some() {
            lanes.push(Lane::Semantic);
        }
        if self.keyword_rank.is_some() {
            lanes.push(Lane::Keyword);
        }
        lanes
    }

    pub fn has(&self, lane: Lane) -> bool {
        self.rank(lane).is_some()
    }
}

/// Outcome class of a retrieval call, distinguishable for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStatus {
    Ok,
    /// The query ran and nothing matched.
    NoMatches,
    /// The query carried no usable scope and never ran.
    Unauthorized,
}
