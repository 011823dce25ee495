//! # engram-observability
//!
//! Structured tracing setup with span helpers and named events, plus the
//! lock-free counters the runtime exposes as a metrics snapshot.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use tracing_setup::{init_tracing, init_tracing_with_filter};
