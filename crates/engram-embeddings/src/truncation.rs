//! Token-budget truncation using tiktoken's cl100k_base tokenizer.

use std::sync::Arc;

use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

/// Cuts text to a token budget before it is sent to a provider.
pub struct TokenTruncator {
    bpe: Option<Arc<CoreBPE>>,
    max_tokens: usize,
}

impl TokenTruncator {
    pub fn new(max_tokens: usize) -> Self {
        let bpe = match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Some(Arc::new(bpe)),
            Err(e) => {
                warn!(error = %e, "cl100k_base unavailable, truncating by words");
                None
            }
        };
        Self { bpe, max_tokens }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Count tokens in the given text.
    pub fn count(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => text.split_whitespace().count(),
        }
    }

    /// Return `text` unchanged when within budget, otherwise its longest
    /// prefix that fits.
    pub fn truncate(&self, text: &str) -> String {
        match &self.bpe {
            Some(bpe) => {
                let tokens = bpe.encode_ordinary(text);
                if tokens.len() <= self.max_tokens {
                    return text.to_string();
                }
                debug!(
                    tokens = tokens.len(),
                    budget = self.max_tokens,
                    "truncating embedding input"
                );
                // A cut can land inside a multi-byte character; back off a
                // few tokens until the prefix decodes.
                let mut keep = self.max_tokens;
                while keep > 0 && self.max_tokens - keep < 4 {
                    if let Ok(prefix) = bpe.decode(tokens[..keep].to_vec()) {
                        return prefix;
                    }
                    keep -= 1;
                }
                truncate_words(text, self.max_tokens)
            }
            None => truncate_words(text, self.max_tokens),
        }
    }
}

fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}
