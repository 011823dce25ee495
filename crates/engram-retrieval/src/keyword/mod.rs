//! Keyword lane: tokenizer, query syntax, and the positional BM25 index.

pub mod index;
pub mod tokenizer;

pub use index::{Bm25Params, KeywordHit, KeywordIndex};
pub use tokenizer::{tokenize, KeywordQuery, Token};
