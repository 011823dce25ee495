//! # engram-ingestion
//!
//! Single-writer ingestion: heuristic enrichment → scoped dedup gate → buffer → batched embed → cluster assign → persist → snapshot swap.
//! Reasoning traces re-enter through the same gate behind a depth limit and a per-conversation rate.

pub mod dedup;
pub mod enrichment;
pub mod pipeline;
pub mod reasoning;
pub mod state;
pub mod summarizer;

pub use dedup::{DedupGate, DedupVerdict};
pub use enrichment::{Enricher, Enrichment};
pub use pipeline::{
    spawn_pipeline, FlushReport, IngestOutcome, IngestionHandle, PipelineParts, ReclusterReport,
    Rejection,
};
pub use reasoning::{trace_text, ReasoningGuard};
pub use state::CorpusState;
pub use summarizer::HeuristicSummarizer;
