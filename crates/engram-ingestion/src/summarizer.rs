//! Heuristic episode summarizer: outcome, emotional arc, and primary
//! intent from the member nodes, no model call.

use std::collections::HashMap;

use engram_core::errors::EngramResult;
use engram_core::models::{
    EmotionalArc, Episode, EpisodeSummary, Intent, InteractionNode, Outcome,
};
use engram_core::traits::IEpisodeSummarizer;
use engram_retrieval::keyword::tokenizer::terms;

const RESOLVED_MARKERS: &[&str] = &[
    "thanks", "thank", "worked", "works", "solved", "fixed", "perfect", "great", "resolved",
];
const UNRESOLVED_MARKERS: &[&str] = &[
    "still", "broken", "failing", "fails", "wrong", "doesn", "didn", "useless", "stuck",
];
const POSITIVE_WORDS: &[&str] = &[
    "thanks", "thank", "great", "perfect", "awesome", "helpful", "love", "nice", "works",
    "worked", "glad", "happy",
];
const NEGATIVE_WORDS: &[&str] = &[
    "frustrated", "annoying", "broken", "wrong", "bad", "hate", "angry", "useless", "fails",
    "failing", "stuck", "urgent", "terrible",
];

/// Sentiment below this magnitude counts as neutral.
const ARC_EPSILON: f64 = 0.05;

#[derive(Debug, Clone, Default)]
pub struct HeuristicSummarizer;

impl HeuristicSummarizer {
    pub fn new() -> Self {
        Self
    }
}

fn sentiment(node: &InteractionNode) -> f64 {
    let words = terms(&node.prompt);
    if words.is_empty() {
        return 0.0;
    }
    let pos = words.iter().filter(|w| POSITIVE_WORDS.contains(&w.as_str())).count() as f64;
    let neg = words.iter().filter(|w| NEGATIVE_WORDS.contains(&w.as_str())).count() as f64;
    (pos - neg) / words.len() as f64
}

fn mean_sentiment(nodes: &[&InteractionNode]) -> f64 {
    if nodes.is_empty() {
        return 0.0;
    }
    nodes.iter().map(|n| sentiment(n)).sum::<f64>() / nodes.len() as f64
}

fn outcome(nodes: &[&InteractionNode]) -> Outcome {
    let Some(last) = nodes.last() else {
        return Outcome::Informational;
    };
    let closing = terms(&last.prompt);
    let has = |table: &[&str]| closing.iter().any(|w| table.contains(&w.as_str()));
    if has(UNRESOLVED_MARKERS) {
        Outcome::Unresolved
    } else if has(RESOLVED_MARKERS) {
        Outcome::Resolved
    } else if nodes.len() == 1 {
        Outcome::Informational
    } else if last.signals.intent == Intent::Question || last.response.trim().is_empty() {
        Outcome::Abandoned
    } else {
        Outcome::Informational
    }
}

fn emotional_arc(nodes: &[&InteractionNode]) -> EmotionalArc {
    let overall = mean_sentiment(nodes);
    if nodes.len() >= 2 {
        let (first, second) = nodes.split_at(nodes.len() / 2);
        let delta = mean_sentiment(second) - mean_sentiment(first);
        if delta > ARC_EPSILON {
            return EmotionalArc::Improving;
        }
        if delta < -ARC_EPSILON {
            return EmotionalArc::Deteriorating;
        }
    }
    if overall > ARC_EPSILON {
        EmotionalArc::Positive
    } else if overall < -ARC_EPSILON {
        EmotionalArc::Negative
    } else {
        EmotionalArc::Neutral
    }
}

/// Most frequent intent, ties going to the earliest in the conversation.
fn primary_intent(nodes: &[&InteractionNode]) -> Intent {
    let mut counts: HashMap<Intent, (usize, usize)> = HashMap::new();
    for (position, node) in nodes.iter().enumerate() {
        let entry = counts.entry(node.signals.intent).or_insert((0, position));
        entry.0 += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then_with(|| b.1 .1.cmp(&a.1 .1)))
        .map(|(intent, _)| intent)
        .unwrap_or_default()
}

impl IEpisodeSummarizer for HeuristicSummarizer {
    fn summarize(&self, episode: &Episode, nodes: &[InteractionNode]) -> EngramResult<EpisodeSummary> {
        // Conversation order, as listed on the episode.
        let members: Vec<&InteractionNode> = episode
            .node_ids
            .iter()
            .filter_map(|id| nodes.iter().find(|n| &n.id == id))
            .collect();
        Ok(EpisodeSummary {
            outcome: outcome(&members),
            emotional_arc: emotional_arc(&members),
            primary_intent: primary_intent(&members),
        })
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}
