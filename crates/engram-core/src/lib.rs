//! # engram-core
//!
//! Foundation crate for the Engram memory engine.
//! Defines the data model, authorization scope, config, error taxonomy,
//! and the storage / embedding traits every other crate builds on.

pub mod config;
pub mod constants;
pub mod errors;
pub mod fingerprint;
pub mod models;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::EngramConfig;
pub use errors::{EngramError, EngramResult, ErrorClass};
pub use models::{
    AuthScope, ClusterAssignment, ClusterId, Confidence, Episode, InteractionNode, RawInteraction,
    ReasoningTrace, SignalBundle, TagSet,
};
