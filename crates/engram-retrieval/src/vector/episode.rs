use std::collections::HashSet;

use rayon::prelude::*;

use engram_clustering::cosine_similarity;
use engram_core::config::RetrievalConfig;
use engram_core::models::{AuthScope, Episode};

use super::{sort_ranked, IvfIndex, Ranked};

#[derive(Debug, Clone, Copy)]
pub struct ScoredEpisode<'a> {
    pub episode: &'a Episode,
    pub similarity: f64,
}

/// Episode-level cosine retriever. Narrows to the caller's scope first,
/// then searches the IVF lists when an index is present and fresh; otherwise,
/// or when those lists come up short, scans every in-scope episode.
pub struct EpisodeRetriever<'a> {
    episodes: &'a [Episode],
    ann: Option<&'a IvfIndex>,
    threshold: f64,
    search_lists: usize,
    stale_ratio: f64,
}

impl<'a> EpisodeRetriever<'a> {
    pub fn new(episodes: &'a [Episode], config: &RetrievalConfig) -> Self {
        Self {
            episodes,
            ann: None,
            threshold: config.episode_threshold,
            search_lists: config.ann_search_lists,
            stale_ratio: config.ann_stale_ratio,
        }
    }

    pub fn with_ann(mut self, ann: Option<&'a IvfIndex>) -> Self {
        self.ann = ann;
        self
    }

    /// Whether queries go through the approximate index.
    pub fn uses_ann(&self) -> bool {
        self.ann
            .is_some_and(|ann| !ann.is_stale(self.episodes.len(), self.stale_ratio))
    }

    pub fn retrieve(
        &self,
        query_vector: &[f32],
        top_k: usize,
        scope: Option<&AuthScope>,
        threshold: Option<f64>,
    ) -> Vec<ScoredEpisode<'a>> {
        let Some(scope) = scope else {
            return Vec::new();
        };
        if query_vector.is_empty() || top_k == 0 {
            return Vec::new();
        }
        let threshold = threshold.unwrap_or(self.threshold);
        let episodes = self.episodes;

        let scoped: Vec<usize> = (0..episodes.len())
            .filter(|&p| episodes[p].active && episodes[p].scope.overlaps(scope))
            .collect();
        let mut ranked = match self.ann {
            Some(ann) if self.uses_ann() => {
                // The IVF lists only narrow the scoped set. When they
                // cannot fill top_k, score the whole scoped set.
                let listed: HashSet<usize> = ann
                    .candidates(query_vector, self.search_lists, episodes.len())
                    .into_iter()
                    .collect();
                let narrowed: Vec<usize> =
                    scoped.iter().copied().filter(|p| listed.contains(p)).collect();
                let ranked = self.score(&narrowed, query_vector, threshold);
                if ranked.len() >= top_k || narrowed.len() == scoped.len() {
                    ranked
                } else {
                    self.score(&scoped, query_vector, threshold)
                }
            }
            _ => self.score(&scoped, query_vector, threshold),
        };

        sort_ranked(&mut ranked, |i| episodes[i].id.as_str());
        ranked.truncate(top_k);
        ranked
            .into_iter()
            .map(|r| ScoredEpisode {
                episode: &episodes[r.position],
                similarity: r.similarity,
            })
            .collect()
    }

    fn score(&self, candidates: &[usize], query_vector: &[f32], threshold: f64) -> Vec<Ranked> {
        let episodes = self.episodes;
        candidates
            .par_iter()
            .filter_map(|&position| {
                let episode = &episodes[position];
                if episode.embedding.len() != query_vector.len() {
                    return None;
                }
                let similarity = cosine_similarity(query_vector, &episode.embedding);
                (similarity >= threshold).then_some(Ranked {
                    position,
                    similarity,
                    score: similarity,
                })
            })
            .collect()
    }
}
