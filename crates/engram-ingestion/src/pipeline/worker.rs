//! The single ingestion worker. Owns the corpus state; nothing else writes
//! to the store, the dedup gate, or the cluster engine.

use std::collections::{BTreeSet, HashMap};
use std::ops::ControlFlow;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;
use uuid::Uuid;

use engram_clustering::similarity::normalized_mean;
use engram_clustering::{compute_retrain, RetrainInput};
use engram_core::config::{IngestionConfig, RetrievalConfig};
use engram_core::constants::NODE_TEXT_SEPARATOR;
use engram_core::errors::{
    AuthorizationError, ClusteringError, EmbeddingError, EngramError, EngramResult, ErrorClass,
    IngestionError, StorageError,
};
use engram_core::fingerprint::{content_fingerprint, scoped_fingerprint};
use engram_core::models::{
    AuthScope, ClusterAssignment, Episode, EpisodeSummary, Fingerprint, IndexKind,
    InteractionNode, Origin, TagSet,
};
use engram_core::traits::{ICorpusStorage, IEmbeddingProvider, IEpisodeSummarizer};
use engram_observability::tracing_setup::events;
use engram_observability::EngineMetrics;
use engram_retrieval::{IvfIndex, SnapshotCell};

use super::{Command, FlushReport, IngestOutcome, PipelineParts, ReclusterReport, Rejection, Submission};
use crate::enrichment::{Enricher, Enrichment};
use crate::reasoning::ReasoningGuard;
use crate::state::CorpusState;

/// An accepted item waiting for its embedding.
struct PendingItem {
    id: String,
    submission: Submission,
    enrichment: Enrichment,
    content_hash: String,
    attempts: u32,
    /// Not retried by interval flushes before this instant.
    retry_at: Option<Instant>,
}

impl PendingItem {
    fn is_due(&self, now: Instant) -> bool {
        self.retry_at.map_or(true, |at| at <= now)
    }
}

/// Which deferred items a flush re-attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    /// Only items whose backoff has elapsed.
    Due,
    /// Every deferred item; explicit flushes.
    All,
}

impl PendingItem {
    fn text(&self) -> String {
        let raw = &self.submission.raw;
        format!("{}{}{}", raw.prompt, NODE_TEXT_SEPARATOR, raw.response)
    }

    fn into_node(self, embedding: Vec<f32>, cluster: ClusterAssignment) -> InteractionNode {
        let Submission {
            raw,
            scope,
            origin,
            received_at,
            ..
        } = self.submission;
        InteractionNode {
            id: self.id,
            conversation_id: raw.conversation_id,
            sequence: raw.sequence,
            prompt: raw.prompt,
            response: raw.response,
            created_at: raw.created_at.unwrap_or(received_at),
            embedding,
            scope,
            signals: self.enrichment.signals,
            tags: self.enrichment.tags,
            cluster,
            access: Default::default(),
            active: true,
            origin,
            content_hash: self.content_hash,
        }
    }
}

/// Everything one flush writes, in commit order.
#[derive(Default)]
struct WriteSet {
    nodes: Vec<InteractionNode>,
    fingerprints: Vec<Fingerprint>,
    episodes: Vec<Episode>,
    updated_nodes: Vec<InteractionNode>,
    updated_episodes: Vec<Episode>,
    clusters: Option<Vec<u8>>,
    keywords: Option<Vec<u8>>,
    ann: Option<Vec<u8>>,
}

impl WriteSet {
    /// Nodes go in before the fingerprints that name them, records before
    /// the indexes derived from them.
    fn commit(&self, storage: &dyn ICorpusStorage) -> EngramResult<u64> {
        let _span = engram_observability::storage_span!(storage.backend_name(), "flush").entered();
        if !self.nodes.is_empty() {
            storage.append_nodes(&self.nodes)?;
        }
        if !self.fingerprints.is_empty() {
            storage.append_fingerprints(&self.fingerprints)?;
        }
        if !self.episodes.is_empty() {
            storage.append_episodes(&self.episodes)?;
        }
        if !self.updated_nodes.is_empty() {
            storage.update_nodes(&self.updated_nodes)?;
        }
        if !self.updated_episodes.is_empty() {
            storage.update_episodes(&self.updated_episodes)?;
        }
        if let Some(bytes) = &self.clusters {
            storage.write_index(IndexKind::Clusters, bytes)?;
        }
        if let Some(bytes) = &self.keywords {
            storage.write_index(IndexKind::Keywords, bytes)?;
        }
        if let Some(bytes) = &self.ann {
            storage.write_index(IndexKind::Ann, bytes)?;
        }
        Ok(storage.manifest()?.corpus_version)
    }
}

pub(super) struct Worker {
    config: IngestionConfig,
    retrieval: RetrievalConfig,
    dimensions: usize,
    storage: Arc<dyn ICorpusStorage>,
    embedder: Arc<dyn IEmbeddingProvider>,
    summarizer: Arc<dyn IEpisodeSummarizer>,
    snapshots: Arc<SnapshotCell>,
    metrics: Arc<EngineMetrics>,
    enricher: Enricher,
    state: CorpusState,
    buffer: Vec<PendingItem>,
    retries: Vec<PendingItem>,
    pending_access: HashMap<String, (u64, DateTime<Utc>)>,
    dirty_nodes: BTreeSet<usize>,
    dirty_episodes: BTreeSet<usize>,
    new_episodes: Vec<usize>,
    clusters_dirty: bool,
    last_recluster: Instant,
    nodes_at_recluster: usize,
    flush_gate: Arc<RwLock<()>>,
    halt: Arc<OnceLock<String>>,
    guard: Arc<ReasoningGuard>,
    summaries: mpsc::UnboundedSender<(String, EpisodeSummary)>,
}

pub(super) fn spawn(
    parts: PipelineParts,
    state: CorpusState,
    flush_gate: Arc<RwLock<()>>,
    halt: Arc<OnceLock<String>>,
    guard: Arc<ReasoningGuard>,
    commands: mpsc::Receiver<Command>,
    telemetry: mpsc::Receiver<Vec<String>>,
) -> JoinHandle<()> {
    let (summaries_tx, summaries_rx) = mpsc::unbounded_channel();
    let nodes_at_recluster = state.nodes.len();
    let worker = Worker {
        config: parts.ingestion,
        retrieval: parts.retrieval,
        dimensions: parts.dimensions,
        storage: parts.storage,
        embedder: parts.embedder,
        summarizer: parts.summarizer,
        snapshots: parts.snapshots,
        metrics: parts.metrics,
        enricher: Enricher::new(),
        state,
        buffer: Vec::new(),
        retries: Vec::new(),
        pending_access: HashMap::new(),
        dirty_nodes: BTreeSet::new(),
        dirty_episodes: BTreeSet::new(),
        new_episodes: Vec::new(),
        clusters_dirty: false,
        last_recluster: Instant::now(),
        nodes_at_recluster,
        flush_gate,
        halt,
        guard,
        summaries: summaries_tx,
    };
    tokio::spawn(worker.run(commands, telemetry, summaries_rx))
}

impl Worker {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut telemetry: mpsc::Receiver<Vec<String>>,
        mut summaries: mpsc::UnboundedReceiver<(String, EpisodeSummary)>,
    ) {
        let period = Duration::from_millis(self.config.flush_interval_ms.max(1));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            nodes = self.state.nodes.len(),
            corpus_version = self.state.version,
            "ingestion worker started"
        );

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if self.handle(command).await.is_break() {
                        tracing::info!("ingestion worker stopped");
                        return;
                    }
                }
                Some(ids) = telemetry.recv() => self.note_access(ids),
                Some((episode_id, summary)) = summaries.recv() => self.apply_summary(&episode_id, summary),
                _ = ticker.tick() => self.on_tick().await,
            }
        }

        // Every handle is gone: write out what is left.
        if self.halt.get().is_none() && self.has_pending_work() {
            if let Err(e) = self.flush_with(Retry::All).await {
                tracing::warn!(error = %e, "final flush failed");
            }
        }
        tracing::info!("ingestion worker stopped");
    }

    async fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Ingest { submission, reply } => {
                let result = self.accept(submission);
                let _ = reply.send(result);
                if self.buffer.len() >= self.config.flush_count {
                    if let Err(e) = self.flush_with(Retry::Due).await {
                        tracing::warn!(error = %e, "count-triggered flush failed");
                    }
                }
            }
            Command::Flush { reply } => {
                let _ = reply.send(self.flush_with(Retry::All).await);
            }
            Command::CloseConversation {
                conversation_id,
                scope,
                reply,
            } => {
                let _ = reply.send(self.close_conversation(&conversation_id, &scope).await);
            }
            Command::Deactivate {
                node_id,
                scope,
                reply,
            } => {
                let _ = reply.send(self.deactivate(&node_id, &scope).await);
            }
            Command::Recluster { reply } => {
                let _ = reply.send(self.recluster("requested").await);
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(self.flush_with(Retry::All).await);
                if !self.retries.is_empty() {
                    tracing::error!(
                        pending = self.retries.len(),
                        "stopping with items the provider never embedded"
                    );
                }
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn on_tick(&mut self) {
        self.guard.prune();
        if self.halt.get().is_some() {
            return;
        }
        if self.has_pending_work() {
            if let Err(e) = self.flush_with(Retry::Due).await {
                tracing::warn!(error = %e, "interval flush failed");
            }
        }
        if let Some(trigger) = self.recluster_trigger() {
            if let Err(e) = self.recluster(trigger).await {
                tracing::warn!(trigger, error = %e, "scheduled recluster failed");
            }
        }
    }

    /// Why a batch retrain is due now, if it is: the candidate pool is full
    /// enough, or the interval has passed with new nodes since the last one.
    fn recluster_trigger(&self) -> Option<&'static str> {
        if self.state.nodes.len() <= self.nodes_at_recluster {
            return None;
        }
        let config = self.state.clusters.config();
        if config.recluster_candidates > 0
            && self.state.clusters.candidate_count() >= config.recluster_candidates
        {
            return Some("candidates");
        }
        let interval = Duration::from_millis(config.recluster_interval_ms);
        if config.recluster_interval_ms > 0 && self.last_recluster.elapsed() >= interval {
            return Some("interval");
        }
        None
    }

    /// Pause before the next interval retry of an item that has failed
    /// `attempts` times: none after the first failure, then doubling from
    /// the flush interval up to `max_retry_delay_ms`.
    fn retry_delay(&self, attempts: u32) -> Duration {
        if attempts <= 1 {
            return Duration::ZERO;
        }
        let shift = (attempts - 2).min(16);
        let millis = self.config.flush_interval_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(millis.min(self.config.max_retry_delay_ms))
    }

    fn has_pending_work(&self) -> bool {
        !self.buffer.is_empty()
            || !self.retries.is_empty()
            || !self.pending_access.is_empty()
            || self.has_pending_updates()
    }

    fn has_pending_updates(&self) -> bool {
        !self.dirty_nodes.is_empty()
            || !self.dirty_episodes.is_empty()
            || !self.new_episodes.is_empty()
            || self.clusters_dirty
    }

    fn check_halted(&self) -> EngramResult<()> {
        match self.halt.get() {
            Some(reason) => Err(EngramError::EngineHalted {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Record the failure that stops ingestion for good.
    fn halt(&self, error: EngramError) -> EngramError {
        let reason = error.to_string();
        if self.halt.set(reason.clone()).is_ok() {
            events::engine_halted(&reason);
        }
        error
    }

    // ── Intake ──────────────────────────────────────────────────────────

    fn accept(&mut self, mut submission: Submission) -> EngramResult<IngestOutcome> {
        self.check_halted()?;
        let raw = &submission.raw;
        if raw.is_blank() {
            return Err(malformed("prompt and response are both blank"));
        }
        if raw.conversation_id.trim().is_empty() {
            return Err(malformed("conversation id is blank"));
        }
        let id = match raw.id.as_deref().map(str::trim) {
            Some("") => return Err(malformed("node id is blank")),
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        let span = engram_observability::ingestion_span!(id);
        let _enter = span.enter();

        if let Origin::Reasoning { depth } = submission.origin {
            let depth = depth.max(self.parent_depth(submission.source_node_id.as_deref()));
            if let Err(e) = self.guard.check_depth(&submission.raw.conversation_id, depth) {
                self.metrics.ingestion.record_throttled();
                return Err(e);
            }
            submission.origin = Origin::Reasoning { depth };
        }

        let raw = &submission.raw;
        let enrichment = self.enricher.enrich(&raw.prompt, &raw.response);
        let content_hash = content_fingerprint(&raw.prompt, &raw.response);
        let fingerprint = scoped_fingerprint(&submission.scope, &content_hash);

        if let Err(verdict) = self.state.dedup.try_reserve(&id, &fingerprint) {
            self.metrics.ingestion.record_duplicate();
            events::duplicate_dropped(&id, verdict.existing_id());
            return Ok(IngestOutcome::Duplicate {
                existing_id: verdict.existing_id().to_string(),
            });
        }

        self.metrics.ingestion.record_accepted(1);
        self.buffer.push(PendingItem {
            id: id.clone(),
            submission,
            enrichment,
            content_hash,
            attempts: 0,
            retry_at: None,
        });
        Ok(IngestOutcome::Accepted { node_id: id })
    }

    /// Lowest depth a trace derived from `source` can have.
    fn parent_depth(&self, source: Option<&str>) -> u32 {
        match source.and_then(|id| self.state.node(id)).map(|n| n.origin) {
            Some(Origin::Reasoning { depth }) => depth.saturating_add(1),
            Some(Origin::Conversation) => 1,
            None => 0,
        }
    }

    fn note_access(&mut self, ids: Vec<String>) {
        let now = Utc::now();
        for id in ids {
            let entry = self.pending_access.entry(id).or_insert((0, now));
            entry.0 += 1;
            entry.1 = now;
        }
    }

    fn apply_summary(&mut self, episode_id: &str, summary: EpisodeSummary) {
        if let Some(position) = self.state.episode_position(episode_id) {
            self.state.episodes_mut()[position].summary = Some(summary);
            self.dirty_episodes.insert(position);
        }
    }

    fn apply_access(&mut self) {
        for (id, (hits, at)) in std::mem::take(&mut self.pending_access) {
            if let Some(position) = self.state.node_position(&id) {
                self.state.nodes_mut()[position].access.record(hits, at);
                self.dirty_nodes.insert(position);
            }
        }
    }

    // ── Flush ───────────────────────────────────────────────────────────

    /// Flush for internal callers; deferred items keep their backoff.
    async fn flush(&mut self) -> EngramResult<FlushReport> {
        self.flush_with(Retry::Due).await
    }

    async fn flush_with(&mut self, retry: Retry) -> EngramResult<FlushReport> {
        self.check_halted()?;
        let span = engram_observability::flush_span!(self.buffer.len() + self.retries.len());
        let gate = Arc::clone(&self.flush_gate);
        let _exclusive = gate.write().await;
        self.flush_locked(retry).instrument(span).await
    }

    async fn flush_locked(&mut self, retry: Retry) -> EngramResult<FlushReport> {
        let started = Instant::now();
        self.apply_access();

        let now = Instant::now();
        let (mut items, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.retries)
            .into_iter()
            .partition(|item| retry == Retry::All || item.is_due(now));
        self.retries = waiting;
        items.append(&mut self.buffer);
        let mut report = FlushReport::default();
        if items.is_empty() && !self.has_pending_updates() {
            self.note_retries(&mut report);
            report.corpus_version = self.state.version;
            return Ok(report);
        }

        // Embed, then sort each item into accepted, deferred, or rejected.
        let results = self.embed(&items).await;
        let mut accepted = Vec::with_capacity(items.len());
        for (mut item, result) in items.into_iter().zip(results) {
            match result {
                Ok(vector) if vector.len() == self.dimensions => accepted.push((item, vector)),
                Ok(vector) => {
                    let err = EmbeddingError::DimensionMismatch {
                        expected: self.dimensions,
                        actual: vector.len(),
                    };
                    self.reject(&item.id, &err.into(), &mut report);
                }
                // Never dropped: the caller already holds an Accepted id.
                Err(e) if matches!(e.class(), ErrorClass::Transient | ErrorClass::Fatal) => {
                    item.attempts += 1;
                    let delay = self.retry_delay(item.attempts);
                    item.retry_at = Some(Instant::now() + delay);
                    self.metrics.ingestion.record_deferred();
                    if item.attempts == self.config.max_item_attempts {
                        self.metrics.ingestion.record_unavailable();
                        events::item_unavailable(&item.id, item.attempts, delay.as_millis(), &e.to_string());
                    } else {
                        events::item_deferred(&item.id, item.attempts, &e.to_string());
                    }
                    self.retries.push(item);
                }
                Err(e) => self.reject(&item.id, &e, &mut report),
            }
        }
        self.note_retries(&mut report);

        if accepted.is_empty() && !self.has_pending_updates() {
            report.corpus_version = self.state.version;
            return Ok(report);
        }

        // Cluster, index, and stage the new nodes in arrival order.
        let old_len = self.state.nodes.len();
        let mut new_nodes = Vec::with_capacity(accepted.len());
        let mut fingerprints = Vec::with_capacity(accepted.len());
        for (item, vector) in accepted {
            let cluster = self.state.clusters.assign(&item.id, &vector);
            if let Some(fp) = self.state.dedup.reserved_fingerprint(&item.id) {
                fingerprints.push(fp);
            }
            new_nodes.push(item.into_node(vector, cluster));
        }
        {
            let keywords = self.state.keywords_mut();
            for node in &new_nodes {
                keywords.add(&node.id, &node.text());
            }
        }
        self.state.push_nodes(new_nodes);
        let appended = self.state.nodes.len() - old_len;

        let writes = match self.write_set(old_len, fingerprints) {
            Ok(writes) => writes,
            Err(e) => return Err(self.halt(e)),
        };
        report.updated = writes.updated_nodes.len() + writes.updated_episodes.len();
        report.episodes = writes.episodes.len();

        let storage = Arc::clone(&self.storage);
        let committed = tokio::task::spawn_blocking(move || writes.commit(storage.as_ref()))
            .await
            .unwrap_or_else(|e| {
                Err(StorageError::Unreachable {
                    reason: format!("flush task failed: {e}"),
                }
                .into())
            });
        let version = match committed {
            Ok(version) => version,
            Err(e) => return Err(self.halt(e)),
        };

        // Durable: release reservations into the committed set and publish.
        for node in &self.state.nodes[old_len..] {
            self.state.dedup.commit(&node.id);
        }
        self.dirty_nodes.clear();
        self.dirty_episodes.clear();
        self.new_episodes.clear();
        self.clusters_dirty = false;
        self.state.version = version;
        self.snapshots.store(Arc::new(self.state.snapshot()));

        for node in &self.state.nodes[old_len..] {
            events::node_ingested(&node.id, &node.conversation_id, node.cluster.cluster_id);
        }
        report.appended = appended;
        report.corpus_version = version;
        self.metrics
            .ingestion
            .record_flush((report.appended + report.episodes + report.updated) as u64);
        events::flush_completed(
            report.appended,
            report.episodes,
            version,
            started.elapsed().as_millis(),
        );
        Ok(report)
    }

    fn write_set(&mut self, old_len: usize, fingerprints: Vec<Fingerprint>) -> EngramResult<WriteSet> {
        let appended = self.state.nodes.len() > old_len;
        let ann = if self.new_episodes.is_empty() {
            None
        } else {
            self.rebuild_ann_if_stale()?
        };
        let new_episodes: BTreeSet<usize> = self.new_episodes.iter().copied().collect();
        Ok(WriteSet {
            nodes: self.state.nodes[old_len..].to_vec(),
            fingerprints,
            episodes: self
                .new_episodes
                .iter()
                .map(|&i| self.state.episodes[i].clone())
                .collect(),
            updated_nodes: self
                .dirty_nodes
                .iter()
                .filter(|&&i| i < old_len)
                .map(|&i| self.state.nodes[i].clone())
                .collect(),
            updated_episodes: self
                .dirty_episodes
                .iter()
                .filter(|&&i| !new_episodes.contains(&i))
                .map(|&i| self.state.episodes[i].clone())
                .collect(),
            clusters: if appended || self.clusters_dirty {
                Some(self.state.clusters.to_state().to_bytes()?)
            } else {
                None
            },
            keywords: if appended {
                Some(self.state.keywords.to_bytes()?)
            } else {
                None
            },
            ann,
        })
    }

    fn rebuild_ann_if_stale(&mut self) -> EngramResult<Option<Vec<u8>>> {
        let episodes = self.state.episodes.len();
        if !self.retrieval.ann_enabled || episodes < self.retrieval.ann_min_episodes {
            return Ok(None);
        }
        let stale = self
            .state
            .ann
            .as_ref()
            .map_or(true, |ann| ann.is_stale(episodes, self.retrieval.ann_stale_ratio));
        if !stale {
            return Ok(None);
        }
        let vectors: Vec<&[f32]> = self
            .state
            .episodes
            .iter()
            .map(|e| e.embedding.as_slice())
            .collect();
        let Some(index) = IvfIndex::build(&vectors, self.retrieval.ann_lists) else {
            return Ok(None);
        };
        let bytes = index.to_bytes()?;
        self.state.ann = Some(Arc::new(index));
        self.metrics.ingestion.record_index_rebuild();
        events::index_rebuilt("ann", "episode count outgrew the index");
        Ok(Some(bytes))
    }

    async fn embed(&self, items: &[PendingItem]) -> Vec<EngramResult<Vec<f32>>> {
        if items.is_empty() {
            return Vec::new();
        }
        let texts: Vec<String> = items.iter().map(PendingItem::text).collect();
        let n = texts.len();
        let embedder = Arc::clone(&self.embedder);
        let span = engram_observability::embedding_span!(self.embedder.name(), n);
        match tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .instrument(span)
            .await
        {
            Ok(results) if results.len() == n => results,
            Ok(results) => {
                let reason = format!("provider returned {} results for {n} texts", results.len());
                (0..n)
                    .map(|_| Err(EmbeddingError::InvalidResponse { reason: reason.clone() }.into()))
                    .collect()
            }
            Err(e) => (0..n)
                .map(|_| {
                    Err(EmbeddingError::TemporarilyUnavailable {
                        attempts: 0,
                        reason: e.to_string(),
                    }
                    .into())
                })
                .collect(),
        }
    }

    fn note_retries(&self, report: &mut FlushReport) {
        report.deferred = self.retries.len();
        report.unavailable = self
            .retries
            .iter()
            .filter(|item| item.attempts >= self.config.max_item_attempts)
            .map(|item| item.id.clone())
            .collect();
    }

    fn reject(&mut self, node_id: &str, error: &EngramError, report: &mut FlushReport) {
        self.state.dedup.release(node_id);
        self.metrics.ingestion.record_rejected();
        let class = error.class();
        let reason = error.to_string();
        events::item_rejected(node_id, class.as_str(), &reason);
        report.rejected.push(Rejection {
            node_id: node_id.to_string(),
            class,
            reason,
        });
    }

    // ── Episodes, deactivation, recluster ───────────────────────────────

    async fn close_conversation(
        &mut self,
        conversation_id: &str,
        scope: &AuthScope,
    ) -> EngramResult<Option<Episode>> {
        self.flush().await?;

        let all = self.state.conversation_nodes(conversation_id);
        if all.is_empty() {
            return Ok(None);
        }
        let members: Vec<&InteractionNode> =
            all.into_iter().filter(|n| n.scope.overlaps(scope)).collect();
        let Some(first) = members.first() else {
            return Err(AuthorizationError::OutOfScope {
                id: conversation_id.to_string(),
            }
            .into());
        };

        let mut tags = TagSet::default();
        for node in &members {
            tags.merge(&node.tags);
        }
        let episode = Episode {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            scope: first.scope.clone(),
            node_ids: members.iter().map(|n| n.id.clone()).collect(),
            created_at: Utc::now(),
            embedding: normalized_mean(members.iter().map(|n| n.embedding.as_slice())),
            tags,
            summary: None,
            active: true,
        };
        let member_nodes: Vec<InteractionNode> = members.into_iter().cloned().collect();

        // A conversation closed again supersedes its earlier episode.
        let superseded: Vec<usize> = self
            .state
            .episodes
            .iter()
            .enumerate()
            .filter(|(_, e)| e.active && e.conversation_id == conversation_id && e.scope.overlaps(scope))
            .map(|(i, _)| i)
            .collect();
        for position in superseded {
            self.state.episodes_mut()[position].active = false;
            self.dirty_episodes.insert(position);
        }

        self.new_episodes.push(self.state.episodes.len());
        self.state.push_episode(episode.clone());
        self.flush().await?;

        self.spawn_summary(episode.clone(), member_nodes);
        Ok(Some(episode))
    }

    /// Summaries run off the worker; the result comes back through the
    /// summaries channel and is persisted at a later flush.
    fn spawn_summary(&self, episode: Episode, nodes: Vec<InteractionNode>) {
        let summarizer = Arc::clone(&self.summarizer);
        let results = self.summaries.clone();
        tokio::task::spawn_blocking(move || match summarizer.summarize(&episode, &nodes) {
            Ok(summary) => {
                let _ = results.send((episode.id, summary));
            }
            Err(e) => tracing::warn!(
                episode_id = %episode.id,
                summarizer = summarizer.name(),
                error = %e,
                "episode summary failed"
            ),
        });
    }

    async fn deactivate(&mut self, node_id: &str, scope: &AuthScope) -> EngramResult<()> {
        self.flush().await?;
        let position = self
            .state
            .node_position(node_id)
            .ok_or_else(|| EngramError::NodeNotFound {
                id: node_id.to_string(),
            })?;
        if !self.state.nodes[position].scope.overlaps(scope) {
            return Err(AuthorizationError::OutOfScope {
                id: node_id.to_string(),
            }
            .into());
        }
        if self.state.nodes[position].active {
            self.state.nodes_mut()[position].active = false;
            self.dirty_nodes.insert(position);
            self.flush().await?;
        }
        Ok(())
    }

    /// Retrain on the worker, so no flush can interleave: flush what is
    /// buffered, compute the new model off-thread, install it, and persist
    /// the reassignments in one more flush.
    async fn recluster(&mut self, trigger: &'static str) -> EngramResult<ReclusterReport> {
        self.check_halted()?;
        self.flush().await?;
        self.last_recluster = Instant::now();
        self.nodes_at_recluster = self.state.nodes.len();

        let nodes = Arc::clone(&self.state.nodes);
        let previous = self.state.clusters.centroids().to_vec();
        let next_id = self.state.clusters.next_id();
        let config = self.state.clusters.config().clone();
        let span = engram_observability::recluster_span!(nodes.len());
        let outcome = tokio::task::spawn_blocking(move || {
            let inputs: Vec<RetrainInput<'_>> = nodes
                .iter()
                .filter(|n| n.active)
                .map(|n| RetrainInput {
                    node_id: &n.id,
                    vector: &n.embedding,
                    text: &n.prompt,
                })
                .collect();
            compute_retrain(&inputs, &previous, next_id, &config)
        })
        .instrument(span)
        .await
        .map_err(|e| ClusteringError::TrainingFailed {
            reason: e.to_string(),
        })??;

        self.state.clusters.install(&outcome);
        let mut reassigned = 0;
        for (node_id, assignment) in &outcome.assignments {
            let Some(position) = self.state.node_position(node_id) else {
                continue;
            };
            if self.state.nodes[position].cluster != *assignment {
                self.state.nodes_mut()[position].cluster = assignment.clone();
                self.dirty_nodes.insert(position);
                reassigned += 1;
            }
        }
        self.clusters_dirty = true;
        let flushed = self.flush().await?;

        self.metrics.ingestion.record_recluster();
        events::recluster_completed(trigger, outcome.centroids.len(), outcome.noise, outcome.promoted);
        Ok(ReclusterReport {
            clusters: outcome.centroids.len(),
            noise: outcome.noise,
            promoted: outcome.promoted,
            reassigned,
            corpus_version: flushed.corpus_version,
        })
    }
}

fn malformed(reason: &str) -> EngramError {
    IngestionError::MalformedItem {
        reason: reason.to_string(),
    }
    .into()
}
