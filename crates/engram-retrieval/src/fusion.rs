//! Reciprocal Rank Fusion: score = Σ weight_lane / (k + rank_lane)
//!
//! Combines the semantic and keyword rankings without normalizing their
//! raw scores against each other. The keyword lane carries a boost
//! multiplier; an item missing from a lane gets no term for that lane.

use std::collections::HashMap;

use engram_core::config::RetrievalConfig;
use engram_core::models::{Lane, Provenance};

/// One lane's ranking: ids best first. Rank is the 1-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneRanking {
    pub lane: Lane,
    pub ids: Vec<String>,
}

impl LaneRanking {
    pub fn new(lane: Lane, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            lane,
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// A candidate after fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub id: String,
    /// Fused RRF score (higher = more relevant).
    pub rrf_score: f64,
    /// Which lanes ranked this id, and where.
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrfParams {
    /// Smoothing constant. Higher k flattens the advantage of top ranks.
    pub k: u32,
    pub keyword_boost: f64,
}

impl Default for RrfParams {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for RrfParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            k: config.rrf_k,
            keyword_boost: config.keyword_boost,
        }
    }
}

impl RrfParams {
    fn weight(&self, lane: Lane) -> f64 {
        match lane {
            Lane::Semantic => 1.0,
            Lane::Keyword => self.keyword_boost,
        }
    }
}

/// Fuse lane rankings.
///
/// The result depends only on the set of (lane, id, rank) facts, never on
/// the order the lanes are passed in: ranks are collected first, terms are
/// summed in a fixed lane order, and equal scores are ordered by id. If a
/// lane repeats an id, its best rank counts.
pub fn fuse(lanes: &[LaneRanking], params: RrfParams) -> Vec<FusedCandidate> {
    let mut ranks: HashMap<&str, Provenance> = HashMap::new();

    for ranking in lanes {
        for (i, id) in ranking.ids.iter().enumerate() {
            let rank = i + 1;
            let provenance = ranks.entry(id.as_str()).or_default();
            match provenance.rank(ranking.lane) {
                Some(existing) if existing <= rank => {}
                _ => provenance.set_rank(ranking.lane, rank),
            }
        }
    }

    let k = params.k as f64;
    let mut candidates: Vec<FusedCandidate> = ranks
        .into_iter()
        .map(|(id, provenance)| {
            let rrf_score: f64 = [Lane::Semantic, Lane::Keyword]
                .into_iter()
                .filter_map(|lane| {
                    provenance
                        .rank(lane)
                        .map(|rank| params.weight(lane) / (k + rank as f64))
                })
                .sum();
            FusedCandidate {
                id: id.to_string(),
                rrf_score,
                provenance,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.rrf_score
            .partial_cmp(&a.rrf_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates
}
