//! # engram-clustering
//!
//! Two-tier topic clustering. A batch model (HDBSCAN over the whole
//! corpus) gives stable clusters; between retrains the streaming layer
//! assigns new vectors through one state machine:
//!
//! ```text
//! unassigned ─▶ soft-predict ≥ 0.5 ─▶ batch cluster
//!            └▶ nearest centroid ≥ 0.7 ─▶ joined cluster
//!            └▶ novelty ≥ 0.6 ─▶ new-cluster candidate
//!            └▶ otherwise unassigned
//! ```
//!
//! Retrains are computed offline ([`compute_retrain`]) and swapped in
//! with [`StreamingClusterEngine::install`].

pub mod batch;
pub mod labeling;
pub mod model;
pub mod similarity;
pub mod state;
pub mod streaming;
pub mod view;

pub use batch::{compute_retrain, RetrainInput, RetrainOutcome};
pub use model::{BatchModel, ClusterProfile};
pub use similarity::cosine_similarity;
pub use state::{Candidate, ClusterState};
pub use streaming::StreamingClusterEngine;
pub use view::{Centroid, ClusterView, Thresholds};
