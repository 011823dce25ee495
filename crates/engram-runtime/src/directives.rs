//! Execution results for inline retrieval directives.

use engram_core::errors::EngramResult;
use engram_retrieval::{Directive, DirectiveError, EpisodeOutcome, RetrievalOutcome};

/// What one directive produced.
#[derive(Debug, Clone)]
pub enum DirectiveOutput {
    /// Vector, keyword and recall directives return interaction nodes.
    Nodes(RetrievalOutcome),
    Episodes(EpisodeOutcome),
}

impl DirectiveOutput {
    pub fn len(&self) -> usize {
        match self {
            Self::Nodes(outcome) => outcome.hits.len(),
            Self::Episodes(outcome) => outcome.hits.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct DirectiveResult {
    pub directive: Directive,
    pub output: EngramResult<DirectiveOutput>,
}

/// Every directive found in a text with its result, in order of
/// appearance. Malformed markers are listed and were not run.
#[derive(Debug, Default)]
pub struct DirectiveRun {
    pub results: Vec<DirectiveResult>,
    pub errors: Vec<DirectiveError>,
}

impl DirectiveRun {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.errors.is_empty()
    }
}
