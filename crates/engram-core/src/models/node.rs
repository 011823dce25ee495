use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuthScope, ClusterAssignment, SignalBundle, TagSet};
use crate::constants::NODE_TEXT_SEPARATOR;

/// Where a node's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Origin {
    #[default]
    Conversation,
    /// Re-ingested reasoning output, `depth` hops away from a user exchange.
    Reasoning { depth: u32 },
}

/// How often a node has been returned by retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AccessTelemetry {
    pub count: u64,
    pub last_access: Option<DateTime<Utc>>,
}

impl AccessTelemetry {
    pub fn record(&mut self, hits: u64, at: DateTime<Utc>) {
        self.count = self.count.saturating_add(hits);
        self.last_access = Some(match self.last_access {
            Some(prev) if prev > at => prev,
            _ => at,
        });
    }
}

/// One user/assistant exchange.
///
/// The embedding is persisted in the vectors area, index-aligned with the
/// record, so it is skipped by serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionNode {
    pub id: String,
    pub conversation_id: String,
    pub sequence: u32,
    pub prompt: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub scope: AuthScope,
    pub signals: SignalBundle,
    pub tags: TagSet,
    pub cluster: ClusterAssignment,
    #[serde(default)]
    pub access: AccessTelemetry,
    pub active: bool,
    #[serde(default)]
    pub origin: Origin,
    /// Fingerprint of the normalized content.
    pub content_hash: String,
}

impl InteractionNode {
    /// Prompt and response joined as one text.
    pub fn text(&self) -> String {
        format!("{}{}{}", self.prompt, NODE_TEXT_SEPARATOR, self.response)
    }
}

impl PartialEq for InteractionNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for InteractionNode {}
