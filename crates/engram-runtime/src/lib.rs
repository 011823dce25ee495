//! # engram-runtime
//!
//! The public face of Engram: [`Engram`] opens a corpus, verifies and
//! repairs its derived indexes, starts the ingestion worker and serves the
//! scoped retrieval and ingestion APIs.

pub mod directives;
pub mod integrity;
pub mod runtime;

pub use directives::{DirectiveOutput, DirectiveResult, DirectiveRun};
pub use integrity::{IndexRebuild, IntegrityReport};
pub use runtime::Engram;

pub use engram_core::{AuthScope, EngramConfig, EngramError, EngramResult, ErrorClass};
pub use engram_ingestion::{FlushReport, IngestOutcome, ReclusterReport};
pub use engram_retrieval::{RetrievalOutcome, RetrievalRequest};
