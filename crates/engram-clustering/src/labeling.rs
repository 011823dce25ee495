//! Cluster labels: the most distinctive terms of a cluster's member texts,
//! scored by TF-IDF against the rest of the corpus.

use std::collections::{HashMap, HashSet};

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "do", "does", "for", "from",
    "have", "how", "i", "if", "in", "is", "it", "its", "me", "my", "not", "of", "on", "or",
    "so", "that", "the", "this", "to", "was", "we", "what", "when", "which", "with", "you",
    "your",
];

/// Label each group of documents with its `terms` most distinctive words.
///
/// `groups[i]` holds the texts of cluster `i`; document frequency is taken
/// across groups so words shared by every cluster score low.
pub fn label_groups(groups: &[Vec<&str>], terms: usize) -> Vec<String> {
    let tokenized: Vec<Vec<String>> = groups
        .iter()
        .map(|docs| docs.iter().flat_map(|d| tokenize(d)).collect())
        .collect();

    let mut df: HashMap<&str, usize> = HashMap::new();
    for tokens in &tokenized {
        let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        for term in unique {
            *df.entry(term).or_insert(0) += 1;
        }
    }
    let n_groups = groups.len().max(1) as f64;

    tokenized
        .iter()
        .map(|tokens| {
            let mut tf: HashMap<&str, usize> = HashMap::new();
            for token in tokens {
                *tf.entry(token.as_str()).or_insert(0) += 1;
            }
            let total = tokens.len().max(1) as f64;
            let mut scored: Vec<(&str, f64)> = tf
                .into_iter()
                .map(|(term, count)| {
                    let idf = (n_groups / *df.get(term).unwrap_or(&1) as f64).ln() + 1.0;
                    (term, count as f64 / total * idf)
                })
                .collect();
            // Ties break alphabetically so labels are stable across runs.
            scored.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(b.0))
            });
            scored
                .into_iter()
                .take(terms)
                .map(|(t, _)| t)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()) && !w.chars().all(|c| c.is_numeric()))
        .collect()
}
