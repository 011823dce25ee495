mod cluster;
mod confidence;
mod episode;
mod item;
mod manifest;
mod node;
mod retrieval;
mod scope;
mod signals;
mod tags;

pub use cluster::{AssignmentSource, ClusterAssignment, ClusterId, NearestCluster};
pub use confidence::Confidence;
pub use episode::{EmotionalArc, Episode, EpisodeSummary, Outcome};
pub use item::{RawInteraction, ReasoningTrace};
pub use manifest::{Fingerprint, IndexKind, Manifest, RecordKind};
pub use node::{AccessTelemetry, InteractionNode, Origin};
pub use retrieval::{Lane, Provenance, RetrievalMode, RetrievalStatus};
pub use scope::AuthScope;
pub use signals::{Complexity, Intent, SignalBundle, Urgency};
pub use tags::{Domain, TagSet};
