//! The ingestion pipeline: one worker task owning every write, fed by a
//! bounded queue.
//!
//! ```text
//! ingest ─► scope ─► enrich ─► dedup reserve ─► buffer ─┐
//!                                                       │ count or interval
//! flush ◄───────────────────────────────────────────────┘
//!   embed ─► cluster assign ─► keyword add ─► persist ─► commit dedup ─► swap snapshot
//! ```
//!
//! Callers talk to the worker through an [`IngestionHandle`]: each command
//! carries a oneshot reply. Reasoning traces enter through the same queue
//! and the same dedup gate, after the depth and rate guard, and never
//! while a flush holds the gate.

mod worker;

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

use engram_core::config::{IngestionConfig, RetrievalConfig};
use engram_core::errors::{
    AuthorizationError, EngramError, EngramResult, ErrorClass, IngestionError,
};
use engram_core::models::{AuthScope, Episode, Origin, RawInteraction, ReasoningTrace};
use engram_core::traits::{ICorpusStorage, IEmbeddingProvider, IEpisodeSummarizer};
use engram_observability::EngineMetrics;
use engram_retrieval::{IAccessRecorder, SnapshotCell};

use crate::reasoning::{trace_text, ReasoningGuard};
use crate::state::CorpusState;

/// Result of one `ingest` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum IngestOutcome {
    /// Buffered; the node becomes retrievable at the next flush.
    Accepted { node_id: String },
    /// Dropped by the dedup gate.
    Duplicate { existing_id: String },
}

impl IngestOutcome {
    pub fn node_id(&self) -> &str {
        match self {
            Self::Accepted { node_id } => node_id,
            Self::Duplicate { existing_id } => existing_id,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// An item dropped during a flush.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub node_id: String,
    pub class: ErrorClass,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlushReport {
    /// Nodes appended to the corpus.
    pub appended: usize,
    /// Episodes appended to the corpus.
    pub episodes: usize,
    /// Existing records rewritten (telemetry, deactivation, summaries, clusters).
    pub updated: usize,
    /// Items waiting for another embedding attempt.
    pub deferred: usize,
    /// Deferred items past `max_item_attempts`. Still queued, still
    /// reserved in the dedup gate.
    pub unavailable: Vec<String>,
    pub rejected: Vec<Rejection>,
    pub corpus_version: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReclusterReport {
    pub clusters: usize,
    pub noise: usize,
    pub promoted: usize,
    pub reassigned: usize,
    pub corpus_version: u64,
}

/// Everything the worker needs, built once by the caller.
pub struct PipelineParts {
    pub ingestion: IngestionConfig,
    pub retrieval: RetrievalConfig,
    /// Corpus vector dimension; vectors of any other length are rejected.
    pub dimensions: usize,
    pub storage: Arc<dyn ICorpusStorage>,
    pub embedder: Arc<dyn IEmbeddingProvider>,
    pub summarizer: Arc<dyn IEpisodeSummarizer>,
    pub snapshots: Arc<SnapshotCell>,
    pub metrics: Arc<EngineMetrics>,
}

/// A validated submission on its way to the worker.
#[derive(Debug)]
pub(crate) struct Submission {
    pub raw: RawInteraction,
    pub scope: AuthScope,
    pub origin: Origin,
    pub source_node_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

pub(crate) type Reply<T> = oneshot::Sender<EngramResult<T>>;

pub(crate) enum Command {
    Ingest {
        submission: Submission,
        reply: Reply<IngestOutcome>,
    },
    Flush {
        reply: Reply<FlushReport>,
    },
    CloseConversation {
        conversation_id: String,
        scope: AuthScope,
        reply: Reply<Option<Episode>>,
    },
    Deactivate {
        node_id: String,
        scope: AuthScope,
        reply: Reply<()>,
    },
    Recluster {
        reply: Reply<ReclusterReport>,
    },
    Shutdown {
        reply: Reply<FlushReport>,
    },
}

/// Cloneable front of the ingestion worker.
#[derive(Clone)]
pub struct IngestionHandle {
    commands: mpsc::Sender<Command>,
    telemetry: mpsc::Sender<Vec<String>>,
    flush_gate: Arc<RwLock<()>>,
    guard: Arc<ReasoningGuard>,
    halt: Arc<OnceLock<String>>,
    metrics: Arc<EngineMetrics>,
}

/// Start the worker on the current tokio runtime.
pub fn spawn_pipeline(parts: PipelineParts, state: CorpusState) -> (IngestionHandle, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::channel(parts.ingestion.queue_capacity.max(1));
    let (telemetry_tx, telemetry_rx) = mpsc::channel(parts.ingestion.telemetry_capacity.max(1));
    let flush_gate = Arc::new(RwLock::new(()));
    let halt = Arc::new(OnceLock::new());
    let guard = Arc::new(ReasoningGuard::new(
        parts.ingestion.max_reasoning_depth,
        parts.ingestion.reasoning_per_minute,
    ));

    let handle = IngestionHandle {
        commands: commands_tx,
        telemetry: telemetry_tx,
        flush_gate: Arc::clone(&flush_gate),
        guard: Arc::clone(&guard),
        halt: Arc::clone(&halt),
        metrics: Arc::clone(&parts.metrics),
    };
    let task = worker::spawn(parts, state, flush_gate, halt, guard, commands_rx, telemetry_rx);
    (handle, task)
}

impl IngestionHandle {
    /// Buffer one exchange. Returns once the item is accepted into the
    /// buffer or dropped as a duplicate; the node is retrievable after the
    /// next flush.
    pub async fn ingest(&self, raw: RawInteraction, scope: Option<AuthScope>) -> EngramResult<IngestOutcome> {
        self.check_halted()?;
        let scope = scope.ok_or(AuthorizationError::MissingScope)?;
        let submission = Submission {
            raw,
            scope,
            origin: Origin::Conversation,
            source_node_id: None,
            received_at: Utc::now(),
        };
        self.request(|reply| Command::Ingest { submission, reply }).await
    }

    /// Feed a completed reasoning trace back into the corpus.
    ///
    /// Refused when too deep or throttled. The enqueue waits for a running
    /// flush to finish and fails fast with `QueueFull` instead of waiting
    /// for queue space.
    pub async fn ingest_reasoning(
        &self,
        trace: ReasoningTrace,
        scope: Option<AuthScope>,
    ) -> EngramResult<IngestOutcome> {
        self.check_halted()?;
        let scope = scope.ok_or(AuthorizationError::MissingScope)?;
        if let Err(e) = self.guard.check(&trace) {
            self.metrics.ingestion.record_throttled();
            return Err(e);
        }

        let (prompt, response) = trace_text(&trace);
        let submission = Submission {
            raw: RawInteraction::new(trace.conversation_id.clone(), prompt, response),
            scope,
            origin: Origin::Reasoning { depth: trace.depth },
            source_node_id: trace.source_node_id.clone(),
            received_at: Utc::now(),
        };

        let (reply, rx) = oneshot::channel();
        {
            let _gate = self.flush_gate.read().await;
            self.commands
                .try_send(Command::Ingest { submission, reply })
                .map_err(|e| match e {
                    mpsc::error::TrySendError::Full(_) => IngestionError::QueueFull,
                    mpsc::error::TrySendError::Closed(_) => IngestionError::WorkerStopped,
                })?;
        }
        rx.await.map_err(|_| IngestionError::WorkerStopped)?
    }

    /// Flush the buffer now.
    pub async fn flush(&self) -> EngramResult<FlushReport> {
        self.check_halted()?;
        self.request(|reply| Command::Flush { reply }).await
    }

    /// Flush, then store the conversation's nodes visible to `scope` as an
    /// episode. `None` when there is nothing to aggregate.
    pub async fn close_conversation(
        &self,
        conversation_id: &str,
        scope: Option<AuthScope>,
    ) -> EngramResult<Option<Episode>> {
        self.check_halted()?;
        let scope = scope.ok_or(AuthorizationError::MissingScope)?;
        let conversation_id = conversation_id.to_string();
        self.request(|reply| Command::CloseConversation {
            conversation_id,
            scope,
            reply,
        })
        .await
    }

    /// Mark a node inactive. It stays in the corpus but is never returned.
    pub async fn deactivate(&self, node_id: &str, scope: Option<AuthScope>) -> EngramResult<()> {
        self.check_halted()?;
        let scope = scope.ok_or(AuthorizationError::MissingScope)?;
        let node_id = node_id.to_string();
        self.request(|reply| Command::Deactivate {
            node_id,
            scope,
            reply,
        })
        .await
    }

    /// Retrain the batch cluster model over the whole corpus and swap it in.
    pub async fn recluster(&self) -> EngramResult<ReclusterReport> {
        self.check_halted()?;
        self.request(|reply| Command::Recluster { reply }).await
    }

    /// Flush what is buffered and stop the worker.
    pub async fn shutdown(&self) -> EngramResult<FlushReport> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    pub fn halt_reason(&self) -> Option<&str> {
        self.halt.get().map(String::as_str)
    }

    pub fn is_halted(&self) -> bool {
        self.halt.get().is_some()
    }

    fn check_halted(&self) -> EngramResult<()> {
        match self.halt.get() {
            Some(reason) => Err(EngramError::EngineHalted {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> EngramResult<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| IngestionError::WorkerStopped)?;
        rx.await.map_err(|_| IngestionError::WorkerStopped)?
    }
}

impl IAccessRecorder for IngestionHandle {
    fn record_access(&self, node_ids: Vec<String>) {
        if node_ids.is_empty() {
            return;
        }
        if let Err(e) = self.telemetry.try_send(node_ids) {
            tracing::debug!(error = %e, "access telemetry dropped");
        }
    }
}
