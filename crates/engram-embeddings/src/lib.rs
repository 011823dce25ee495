//! # engram-embeddings
//!
//! Text to fixed-dimension vectors through a pluggable provider.
//!
//! ```text
//! text ─► cache (L1 moka ─► L2 SQLite) ─hit─► vector
//!             │ miss
//!             ▼
//!         truncate (cl100k tokens) ─► provider (retry + backoff) ─► validate ─► normalize ─► cache
//! ```
//!
//! Batches return one result per input. Transient provider failures are
//! retried with bounded exponential backoff and then surfaced as
//! `TemporarilyUnavailable`; permanent failures affect only their item.

pub mod cache;
pub mod dimensions;
pub mod engine;
pub mod providers;
pub mod retry;
pub mod truncation;

pub use engine::EmbeddingEngine;
pub use providers::{create_provider, HashedProvider, HttpProvider};
pub use retry::RetryPolicy;
pub use truncation::TokenTruncator;
