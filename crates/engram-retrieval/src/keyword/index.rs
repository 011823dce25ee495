//! Positional inverted index with BM25 ranking.
//!
//! Documents are appended, never rewritten: ingestion adds postings for
//! each new node and the whole index is rebuilt only when it disagrees with
//! the corpus. Scores are divided by the best score of the result set so
//! they land in [0, 1].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use engram_core::config::RetrievalConfig;
use engram_core::errors::{ConsistencyError, EngramResult};
use engram_core::models::IndexKind;

use super::tokenizer::{tokenize, KeywordQuery};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Posting {
    doc: u32,
    positions: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocEntry {
    id: String,
    len: u32,
}

/// BM25 saturation and length-normalization parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for Bm25Params {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            k1: config.bm25_k1,
            b: config.bm25_b,
        }
    }
}

/// A keyword match with its normalized score.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    pub id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordIndex {
    docs: Vec<DocEntry>,
    /// Term to postings, each list ordered by document.
    postings: BTreeMap<String, Vec<Posting>>,
    #[serde(skip)]
    by_id: HashMap<String, u32>,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `(id, text)` pairs in order.
    pub fn build<'a>(docs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut index = Self::new();
        for (id, text) in docs {
            index.add(id, text);
        }
        index
    }

    /// Append postings for one document. Returns false, leaving the index
    /// unchanged, when `id` is already indexed.
    pub fn add(&mut self, id: &str, text: &str) -> bool {
        if self.by_id.contains_key(id) {
            return false;
        }
        let doc = self.docs.len() as u32;
        let tokens = tokenize(text);

        let mut positions: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for token in &tokens {
            positions
                .entry(token.term.clone())
                .or_default()
                .push(token.position);
        }
        for (term, positions) in positions {
            self.postings
                .entry(term)
                .or_default()
                .push(Posting { doc, positions });
        }

        self.docs.push(DocEntry {
            id: id.to_string(),
            len: tokens.len() as u32,
        });
        self.by_id.insert(id.to_string(), doc);
        true
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Indexed ids in insertion order.
    pub fn doc_ids(&self) -> impl Iterator<Item = &str> {
        self.docs.iter().map(|d| d.id.as_str())
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Rank documents for `query` among the ones `allow` accepts. Document
    /// count, document frequencies and average length are taken over the
    /// allowed documents only, so documents outside that set never shape
    /// the scores.
    pub fn search(
        &self,
        query: &KeywordQuery,
        params: Bm25Params,
        allow: impl Fn(&str) -> bool,
        limit: usize,
    ) -> Vec<KeywordHit> {
        if query.is_empty() || self.docs.is_empty() || limit == 0 {
            return Vec::new();
        }

        let visible: Vec<bool> = self.docs.iter().map(|d| allow(&d.id)).collect();
        let (count, total_len) = self
            .docs
            .iter()
            .zip(&visible)
            .filter(|(_, &v)| v)
            .fold((0u64, 0u64), |(n, len), (d, _)| (n + 1, len + d.len as u64));
        if count == 0 {
            return Vec::new();
        }
        let n = count as f64;
        let avg_len = (total_len as f64 / n).max(1.0);
        let mut scores: HashMap<u32, f64> = HashMap::new();

        for term in query.scoring_terms() {
            let Some(list) = self.postings.get(term) else {
                continue;
            };
            let in_view: Vec<&Posting> = list.iter().filter(|p| visible[p.doc as usize]).collect();
            if in_view.is_empty() {
                continue;
            }
            let df = in_view.len() as f64;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
            for posting in in_view {
                let tf = posting.positions.len() as f64;
                let len = self.docs[posting.doc as usize].len as f64;
                let norm = params.k1 * (1.0 - params.b + params.b * len / avg_len);
                *scores.entry(posting.doc).or_default() += idf * tf * (params.k1 + 1.0) / (tf + norm);
            }
        }

        if !query.phrases.is_empty() {
            scores.retain(|doc, _| {
                query
                    .phrases
                    .iter()
                    .all(|phrase| self.contains_phrase(*doc, phrase))
            });
        }

        let max = scores.values().cloned().fold(0.0f64, f64::max);
        if max <= 0.0 {
            return Vec::new();
        }

        let mut hits: Vec<KeywordHit> = scores
            .into_iter()
            .map(|(doc, score)| KeywordHit {
                id: self.docs[doc as usize].id.clone(),
                score: (score / max).clamp(0.0, 1.0),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        hits
    }

    fn positions(&self, doc: u32, term: &str) -> Option<&[u32]> {
        let list = self.postings.get(term)?;
        let at = list.binary_search_by_key(&doc, |p| p.doc).ok()?;
        Some(&list[at].positions)
    }

    fn contains_phrase(&self, doc: u32, phrase: &[String]) -> bool {
        let Some((first, rest)) = phrase.split_first() else {
            return true;
        };
        let Some(starts) = self.positions(doc, first) else {
            return false;
        };
        let mut following = Vec::with_capacity(rest.len());
        for term in rest {
            match self.positions(doc, term) {
                Some(p) => following.push(p),
                None => return false,
            }
        }
        starts.iter().any(|&start| {
            following
                .iter()
                .enumerate()
                .all(|(i, p)| p.binary_search(&(start + i as u32 + 1)).is_ok())
        })
    }

    pub fn to_bytes(&self) -> EngramResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a persisted index, rejecting postings that point past the
    /// document table.
    pub fn from_bytes(bytes: &[u8]) -> EngramResult<Self> {
        let corrupt = |reason: String| ConsistencyError::CorruptIndex {
            index: IndexKind::Keywords.as_str().to_string(),
            reason,
        };
        let mut index: Self =
            serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
        let docs = index.docs.len() as u32;
        if let Some(term) = index
            .postings
            .iter()
            .find(|(_, list)| list.iter().any(|p| p.doc >= docs))
            .map(|(term, _)| term.clone())
        {
            return Err(corrupt(format!("posting for `{term}` past document table")).into());
        }
        index.by_id = index
            .docs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.clone(), i as u32))
            .collect();
        if index.by_id.len() != index.docs.len() {
            return Err(corrupt("repeated document id".into()).into());
        }
        Ok(index)
    }
}
