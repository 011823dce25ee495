//! Tokenization shared by indexing and query parsing.
//!
//! A token is a maximal run of alphanumeric characters or `_`, lower-cased.
//! Positions count tokens, not bytes, so phrase matching is a check for
//! consecutive positions.

/// A token and its position in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub position: u32,
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split `text` into positioned tokens.
pub fn tokenize(text: &str) -> Vec<Token> {
    terms(text)
        .into_iter()
        .enumerate()
        .map(|(i, term)| Token {
            term,
            position: i as u32,
        })
        .collect()
}

/// Lower-cased terms of `text`, in order.
pub fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !is_token_char(c))
        .filter(|w| !w.is_empty())
        .map(|w| w.chars().flat_map(char::to_lowercase).collect())
        .collect()
}

/// A parsed keyword query.
///
/// Bare terms are OR-ed and ranked by BM25. Each phrase is a hard
/// requirement: a document must contain its terms consecutively.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeywordQuery {
    pub terms: Vec<String>,
    pub phrases: Vec<Vec<String>>,
}

impl KeywordQuery {
    /// Parse `text`. Double-quoted segments become phrases; an unmatched
    /// quote is ignored and the rest is read as bare terms.
    pub fn parse(text: &str) -> Self {
        let mut query = KeywordQuery::default();
        let mut rest = text;
        loop {
            let Some(open) = rest.find('"') else {
                query.push_terms(rest);
                break;
            };
            query.push_terms(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('"') {
                Some(close) => {
                    let phrase = terms(&after[..close]);
                    if !phrase.is_empty() {
                        query.phrases.push(phrase);
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    query.push_terms(after);
                    break;
                }
            }
        }
        query
    }

    fn push_terms(&mut self, text: &str) {
        for term in terms(text) {
            if !self.terms.contains(&term) {
                self.terms.push(term);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.phrases.is_empty()
    }

    /// Every distinct term the query scores on, bare and phrase terms alike.
    pub fn scoring_terms(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for term in self.terms.iter().chain(self.phrases.iter().flatten()) {
            if !out.contains(&term.as_str()) {
                out.push(term);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_lowercased_with_positions() {
        let tokens = tokenize("Reset my_password, NOW!");
        let terms: Vec<_> = tokens.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, ["reset", "my_password", "now"]);
        assert_eq!(tokens[2].position, 2);
    }

    #[test]
    fn parses_terms_and_phrases() {
        let q = KeywordQuery::parse(r#"login "reset password" error"#);
        assert_eq!(q.terms, ["login", "error"]);
        assert_eq!(q.phrases, vec![vec!["reset".to_string(), "password".to_string()]]);
        assert_eq!(q.scoring_terms(), ["login", "error", "reset", "password"]);
    }

    #[test]
    fn unmatched_quote_reads_as_terms() {
        let q = KeywordQuery::parse(r#"reset "password"#);
        assert_eq!(q.terms, ["reset", "password"]);
        assert!(q.phrases.is_empty());
    }

    #[test]
    fn empty_input() {
        assert!(KeywordQuery::parse(r#"  "" ... "#).is_empty());
    }
}
