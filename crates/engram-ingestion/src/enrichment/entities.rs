//! Entity and topic extraction.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use super::indicators::STOPWORDS;

macro_rules! pattern {
    ($name:ident, $regex_str:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
    };
}

pattern!(RE_INLINE_CODE, r"`([^`\n]{2,64})`");
pattern!(RE_URL, r"https?://[^\s)>\]]+");
pattern!(RE_PATH, r"(?:^|\s)((?:\.{0,2}/)?(?:[\w.-]+/)+[\w.-]+\.\w{1,8})");
pattern!(RE_ERROR_CODE, r"\b[A-Z]{1,3}\d{3,5}\b");
pattern!(RE_PROPER_NAME, r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b");
pattern!(
    RE_CODE_LINE,
    r"(?m)^\s*(?:fn|def|class|import|let|const|pub|impl|func|SELECT|INSERT|UPDATE|#include)\b"
);

fn captures_into(re: &LazyLock<Option<Regex>>, group: usize, text: &str, out: &mut Vec<String>) {
    if let Some(re) = re.as_ref() {
        for caps in re.captures_iter(text) {
            if let Some(m) = caps.get(group) {
                out.push(m.as_str().trim().to_string());
            }
        }
    }
}

/// Whether the text carries code: a fenced block, or a line opening with
/// a declaration keyword.
pub fn looks_like_code(text: &str) -> bool {
    text.contains("```") || RE_CODE_LINE.as_ref().is_some_and(|re| re.is_match(text))
}

/// Inline code identifiers, URLs, file paths, error codes, and multi-word
/// capitalized names, at most `max` of them.
pub fn extract_entities(text: &str, max: usize) -> BTreeSet<String> {
    let mut found = Vec::new();
    captures_into(&RE_INLINE_CODE, 1, text, &mut found);
    captures_into(&RE_URL, 0, text, &mut found);
    captures_into(&RE_PATH, 1, text, &mut found);
    captures_into(&RE_ERROR_CODE, 0, text, &mut found);
    captures_into(&RE_PROPER_NAME, 0, text, &mut found);

    let mut entities = BTreeSet::new();
    for entity in found.into_iter().filter(|e| !e.is_empty()) {
        if entities.len() >= max {
            break;
        }
        entities.insert(entity);
    }
    entities
}

/// The most frequent content words, ties broken alphabetically.
pub fn extract_topics(terms: &[String], max: usize) -> BTreeSet<String> {
    let stop: HashSet<&str> = STOPWORDS.iter().copied().collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for term in terms {
        if term.len() < 4 || stop.contains(term.as_str()) || term.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        *counts.entry(term.as_str()).or_default() += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().take(max).map(|(t, _)| t.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_code_paths_urls_and_codes() {
        let text = "Calling `Vec::push` in src/main.rs fails with E0502, see \
                    https://doc.rust-lang.org/error_codes/E0502.html for Acme Corp.";
        let entities = extract_entities(text, 16);
        assert!(entities.contains("Vec::push"));
        assert!(entities.contains("src/main.rs"));
        assert!(entities.contains("E0502"));
        assert!(entities.contains("https://doc.rust-lang.org/error_codes/E0502.html"));
        assert!(entities.contains("Acme Corp"));
    }

    #[test]
    fn entity_count_is_bounded() {
        let text = "E1001 E1002 E1003 E1004 E1005";
        assert_eq!(extract_entities(text, 3).len(), 3);
    }

    #[test]
    fn topics_skip_stopwords_and_rank_by_frequency() {
        let terms: Vec<String> = "invoice refund invoice about with the refund invoice tax"
            .split(' ')
            .map(String::from)
            .collect();
        let topics = extract_topics(&terms, 2);
        let expected: BTreeSet<String> = ["invoice", "refund"].into_iter().map(String::from).collect();
        assert_eq!(topics, expected);
    }

    #[test]
    fn code_detection() {
        assert!(looks_like_code("```rust\nlet x = 1;\n```"));
        assert!(looks_like_code("here:\n    fn main() {}"));
        assert!(!looks_like_code("how do I reset my password"));
    }
}
