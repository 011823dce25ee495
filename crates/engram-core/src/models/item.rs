use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw exchange submitted for ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInteraction {
    /// Caller-chosen id. One is generated when absent.
    pub id: Option<String>,
    pub conversation_id: String,
    pub sequence: u32,
    pub prompt: String,
    pub response: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl RawInteraction {
    pub fn new(
        conversation_id: impl Into<String>,
        prompt: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            conversation_id: conversation_id.into(),
            sequence: 0,
            prompt: prompt.into(),
            response: response.into(),
            created_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn is_blank(&self) -> bool {
        self.prompt.trim().is_empty() && self.response.trim().is_empty()
    }
}

/// A completed reasoning trace offered back to the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningTrace {
    pub conversation_id: String,
    /// Node the reasoning started from, if any.
    pub source_node_id: Option<String>,
    pub question: String,
    pub steps: Vec<String>,
    pub conclusion: String,
    /// Hops from the originating user exchange; a trace derived from a
    /// reasoning node has that node's depth plus one.
    pub depth: u32,
}
