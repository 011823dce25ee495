//! # engram-retrieval
//!
//! Scoped hybrid retrieval over an immutable corpus snapshot.
//!
//! - [`keyword`]: positional BM25 index with phrase matching
//! - [`vector`]: interaction and episode cosine retrievers, IVF index for episodes
//! - [`filter`]: signal-based candidate pre-filter that fails open
//! - [`fusion`]: reciprocal rank fusion of the two lanes
//! - [`engine`]: the async query path with per-lane deadlines
//! - [`directives`]: inline `[[name: arg]]` markers

pub mod directives;
pub mod engine;
pub mod filter;
pub mod fusion;
pub mod keyword;
pub mod snapshot;
pub mod vector;

pub use directives::{parse_directives, Directive, DirectiveError, ParsedDirectives, RecallWindow};
pub use engine::{
    EpisodeHit, EpisodeOutcome, IAccessRecorder, RetrievalEngine, RetrievalOutcome,
    RetrievalRequest, RetrievedHit,
};
pub use filter::{FastFilter, FilterOutcome, FilterProfile};
pub use fusion::{fuse, FusedCandidate, LaneRanking, RrfParams};
pub use keyword::{Bm25Params, KeywordHit, KeywordIndex, KeywordQuery};
pub use snapshot::{CorpusSnapshot, ScopeIndex, SnapshotCell};
pub use vector::{EpisodeRetriever, InteractionRetriever, IvfIndex, ScoredEpisode, ScoredNode};
