use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuthScope, Intent, TagSet};

/// How a conversation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Resolved,
    Unresolved,
    Abandoned,
    Informational,
}

/// Overall sentiment trajectory of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalArc {
    Positive,
    Neutral,
    Negative,
    Improving,
    Deteriorating,
}

/// Summary tags computed after an episode is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub outcome: Outcome,
    pub emotional_arc: EmotionalArc,
    pub primary_intent: Intent,
}

/// A full conversation, aggregating its interaction nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub conversation_id: String,
    pub scope: AuthScope,
    /// Member nodes, in conversation order.
    pub node_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub tags: TagSet,
    pub summary: Option<EpisodeSummary>,
    pub active: bool,
}

impl PartialEq for Episode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Episode {}
