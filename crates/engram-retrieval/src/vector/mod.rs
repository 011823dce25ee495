//! Vector lanes: cosine ranking over interaction nodes and episodes.
//!
//! Both retrievers narrow to the caller's scope before any similarity is
//! computed. The episode IVF lists only narrow that scoped set further.

pub mod ann;
pub mod episode;
pub mod interaction;

pub use ann::IvfIndex;
pub use episode::{EpisodeRetriever, ScoredEpisode};
pub use interaction::{InteractionRetriever, ScoredNode};

use std::cmp::Ordering;

/// A candidate position with its similarity and final lane score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Ranked {
    pub position: usize,
    pub similarity: f64,
    pub score: f64,
}

/// Highest score first; ties resolved by record id so rankings are stable.
pub(crate) fn sort_ranked<'a>(ranked: &mut [Ranked], id_of: impl Fn(usize) -> &'a str) {
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| id_of(a.position).cmp(id_of(b.position)))
    });
}
