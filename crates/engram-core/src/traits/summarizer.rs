use crate::errors::EngramResult;
use crate::models::{Episode, EpisodeSummary, InteractionNode};

/// Produces summary tags for a stored episode.
pub trait IEpisodeSummarizer: Send + Sync {
    fn summarize(&self, episode: &Episode, nodes: &[InteractionNode])
        -> EngramResult<EpisodeSummary>;

    fn name(&self) -> &str;
}
