//! Heuristic enricher: rule and keyword matching over raw text, no
//! network, no learned model. Total: every input yields a complete signal
//! bundle, with `Statement` / `Simple` / `Normal` when nothing matches.

pub mod entities;
pub mod indicators;

use std::collections::{BTreeSet, HashSet};

use engram_core::models::{Complexity, Domain, Intent, SignalBundle, TagSet, Urgency};
use engram_retrieval::keyword::tokenizer::terms;

use entities::{extract_entities, extract_topics, looks_like_code};
use indicators::*;

const DEFAULT_MAX_ENTITIES: usize = 16;
const DEFAULT_MAX_TOPICS: usize = 5;

/// Signals and tags computed for one exchange.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Enrichment {
    pub signals: SignalBundle,
    pub tags: TagSet,
}

#[derive(Debug, Clone)]
pub struct Enricher {
    max_entities: usize,
    max_topics: usize,
}

impl Default for Enricher {
    fn default() -> Self {
        Self {
            max_entities: DEFAULT_MAX_ENTITIES,
            max_topics: DEFAULT_MAX_TOPICS,
        }
    }
}

/// Lower-cased text plus its token set, for indicator matching.
struct Text<'a> {
    lower: String,
    words: HashSet<&'a str>,
}

impl<'a> Text<'a> {
    fn new(raw: &str, terms: &'a [String]) -> Self {
        Self {
            lower: raw.to_lowercase(),
            words: terms.iter().map(String::as_str).collect(),
        }
    }

    fn matches(&self, table: &[&str]) -> bool {
        table.iter().any(|entry| {
            if entry.contains(' ') || entry.contains('\'') {
                self.lower.contains(entry)
            } else {
                self.words.contains(entry)
            }
        })
    }
}

impl Enricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, max_entities: usize, max_topics: usize) -> Self {
        self.max_entities = max_entities;
        self.max_topics = max_topics;
        self
    }

    pub fn enrich(&self, prompt: &str, response: &str) -> Enrichment {
        let lead = if prompt.trim().is_empty() { response } else { prompt };
        let lead_terms = terms(lead);
        let lead_text = Text::new(lead, &lead_terms);

        let combined = format!("{prompt}\n{response}");
        let all_terms = terms(&combined);
        let all_text = Text::new(&combined, &all_terms);

        let has_code = looks_like_code(prompt) || looks_like_code(response);
        let has_error = all_text.matches(ERROR_INDICATORS);
        let technical_depth = technical_depth(&all_terms, has_code, has_error);

        let signals = SignalBundle {
            intent: classify_intent(lead, &lead_terms, &lead_text),
            complexity: classify_complexity(lead, &combined, all_terms.len(), has_code, technical_depth),
            technical_depth,
            urgency: classify_urgency(&lead_text),
            has_code,
            has_error,
        }
        .normalized();

        let tags = TagSet {
            domains: classify_domains(&all_text),
            topics: extract_topics(&all_terms, self.max_topics),
            entities: extract_entities(&combined, self.max_entities),
        };

        Enrichment { signals, tags }
    }
}

fn classify_intent(raw: &str, terms: &[String], text: &Text<'_>) -> Intent {
    let first = terms.first().map(String::as_str).unwrap_or_default();
    if terms.len() <= 4 && text.matches(GREETING_INDICATORS) {
        Intent::Greeting
    } else if text.matches(FEEDBACK_INDICATORS) {
        Intent::Feedback
    } else if text.matches(REQUEST_INDICATORS) {
        Intent::Request
    } else if raw.trim_end().ends_with('?') || QUESTION_OPENERS.contains(&first) {
        Intent::Question
    } else if COMMAND_OPENERS.contains(&first) {
        Intent::Command
    } else {
        Intent::Statement
    }
}

fn classify_urgency(text: &Text<'_>) -> Urgency {
    if text.matches(CRITICAL_INDICATORS) {
        Urgency::Critical
    } else if text.matches(HIGH_URGENCY_INDICATORS) {
        Urgency::High
    } else if text.matches(LOW_URGENCY_INDICATORS) {
        Urgency::Low
    } else {
        Urgency::Normal
    }
}

fn classify_domains(text: &Text<'_>) -> BTreeSet<Domain> {
    DOMAIN_INDICATORS
        .iter()
        .filter(|(_, words)| text.matches(words))
        .map(|(domain, _)| *domain)
        .collect()
}

/// Density of technical vocabulary, scaled into [0, 1].
fn technical_depth(terms: &[String], has_code: bool, has_error: bool) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let vocabulary: HashSet<&str> = DOMAIN_INDICATORS
        .iter()
        .filter(|(domain, _)| TECHNICAL_DOMAINS.contains(domain))
        .flat_map(|(_, words)| words.iter().copied())
        .collect();
    let technical = terms
        .iter()
        .filter(|t| vocabulary.contains(t.as_str()) || t.contains('_'))
        .count();
    let density = technical as f64 / terms.len() as f64;
    let mut depth = density * 4.0;
    if has_code {
        depth += 0.25;
    }
    if has_error {
        depth += 0.1;
    }
    depth.min(1.0)
}

fn classify_complexity(
    lead: &str,
    combined: &str,
    words: usize,
    has_code: bool,
    technical_depth: f64,
) -> Complexity {
    let questions = lead.matches('?').count();
    let lines = combined.lines().filter(|l| !l.trim().is_empty()).count();
    let score = [
        words > 60,
        words > 200,
        has_code,
        questions > 1,
        lines > 8,
        technical_depth >= 0.5,
    ]
    .into_iter()
    .filter(|&hit| hit)
    .count();
    match score {
        0 => Complexity::Simple,
        1 | 2 => Complexity::Moderate,
        _ => Complexity::Complex,
    }
}
