//! `Engram`: owns the storage handle, the embedder, the retrieval engine
//! and the ingestion worker, and exposes the scoped APIs over them.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use engram_core::config::EngramConfig;
use engram_core::errors::{AuthorizationError, EngramError, EngramResult, StorageError};
use engram_core::models::{
    AuthScope, Episode, InteractionNode, RawInteraction, ReasoningTrace, RetrievalMode,
};
use engram_core::traits::{ICorpusStorage, IEmbeddingProvider};
use engram_embeddings::EmbeddingEngine;
use engram_ingestion::{
    spawn_pipeline, Enricher, FlushReport, HeuristicSummarizer, IngestOutcome, IngestionHandle,
    PipelineParts, ReclusterReport,
};
use engram_observability::{EngineMetrics, MetricsSnapshot};
use engram_retrieval::{
    parse_directives, Directive, EpisodeOutcome, FilterProfile, RecallWindow, RetrievalEngine,
    RetrievalOutcome, RetrievalRequest, SnapshotCell,
};

use crate::directives::{DirectiveOutput, DirectiveResult, DirectiveRun};
use crate::integrity::{self, IntegrityReport};

/// File name of the persistent embedding cache inside the data directory.
const EMBEDDING_CACHE_FILE: &str = "embedding_cache.db";

pub struct Engram {
    config: EngramConfig,
    storage: Arc<dyn ICorpusStorage>,
    retrieval: RetrievalEngine,
    ingestion: IngestionHandle,
    enricher: Enricher,
    metrics: Arc<EngineMetrics>,
    integrity: IntegrityReport,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Engram {
    /// Open the configured store and embedder, verify the corpus and start
    /// the ingestion worker.
    pub async fn open(config: EngramConfig) -> EngramResult<Self> {
        config.validate()?;
        engram_observability::init_tracing(&config.observability);

        let data_dir = config.storage.data_dir.clone();
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            StorageError::Unreachable {
                reason: format!("cannot create {}: {e}", data_dir.display()),
            }
        })?;

        let storage_config = config.storage.clone();
        let storage = tokio::task::spawn_blocking(move || engram_storage::open_storage(&storage_config))
            .await
            .map_err(|e| StorageError::Unreachable {
                reason: e.to_string(),
            })??;

        let cache_path = config
            .embedding
            .l2_cache_enabled
            .then(|| data_dir.join(EMBEDDING_CACHE_FILE));
        let embedder: Arc<dyn IEmbeddingProvider> =
            Arc::new(EmbeddingEngine::new(&config.embedding, cache_path.as_deref())?);

        Self::open_with(config, embedder, storage).await
    }

    /// Start over an injected provider and store.
    pub async fn open_with(
        config: EngramConfig,
        embedder: Arc<dyn IEmbeddingProvider>,
        storage: Arc<dyn ICorpusStorage>,
    ) -> EngramResult<Self> {
        config.validate()?;
        if embedder.dimensions() != config.embedding.dimensions {
            return Err(EngramError::ConfigError(format!(
                "provider {} produces {}-d vectors, embedding.dimensions is {}",
                embedder.name(),
                embedder.dimensions(),
                config.embedding.dimensions
            )));
        }

        let metrics = Arc::new(EngineMetrics::new());
        let (state, report) = {
            let storage = Arc::clone(&storage);
            let embedder = Arc::clone(&embedder);
            let config = config.clone();
            let metrics = Arc::clone(&metrics);
            tokio::task::spawn_blocking(move || {
                integrity::load_verified(storage.as_ref(), embedder.as_ref(), &config, &metrics)
            })
            .await
            .map_err(|e| StorageError::Unreachable {
                reason: e.to_string(),
            })??
        };

        let snapshots = Arc::new(SnapshotCell::new(state.snapshot()));
        let parts = PipelineParts {
            ingestion: config.ingestion.clone(),
            retrieval: config.retrieval.clone(),
            dimensions: config.embedding.dimensions,
            storage: Arc::clone(&storage),
            embedder: Arc::clone(&embedder),
            summarizer: Arc::new(HeuristicSummarizer::new()),
            snapshots: Arc::clone(&snapshots),
            metrics: Arc::clone(&metrics),
        };
        let (ingestion, worker) = spawn_pipeline(parts, state);

        let retrieval = RetrievalEngine::new(
            snapshots,
            embedder,
            config.retrieval.clone(),
            config.filter.clone(),
            Arc::clone(&metrics),
        )
        .with_access_recorder(Arc::new(ingestion.clone()));

        tracing::info!(
            backend = storage.backend_name(),
            corpus_version = report.corpus_version,
            nodes = report.nodes,
            episodes = report.episodes,
            "engram ready"
        );

        Ok(Self {
            config,
            storage,
            retrieval,
            ingestion,
            enricher: Enricher::new(),
            metrics,
            integrity: report,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn config(&self) -> &EngramConfig {
        &self.config
    }

    /// What the startup checks found and rebuilt.
    pub fn integrity_report(&self) -> &IntegrityReport {
        &self.integrity
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Corpus version of the snapshot queries currently read.
    pub fn snapshot_version(&self) -> u64 {
        self.retrieval.snapshot().version()
    }

    // ── retrieval ───────────────────────────────────────────────────────

    /// Hybrid query. The fast filter profile is derived from the query
    /// text.
    pub async fn retrieve(
        &self,
        query: &str,
        scope: Option<AuthScope>,
        top_k: Option<usize>,
        mode: RetrievalMode,
    ) -> EngramResult<RetrievalOutcome> {
        let mut request = RetrievalRequest::new(query, scope)
            .with_mode(mode)
            .with_profile(self.profile_for(query));
        if let Some(k) = top_k {
            request = request.with_top_k(k);
        }
        self.retrieval.retrieve(request).await
    }

    /// Run a fully specified request as given.
    pub async fn retrieve_with(&self, request: RetrievalRequest) -> EngramResult<RetrievalOutcome> {
        self.retrieval.retrieve(request).await
    }

    /// Rank by a precomputed vector.
    pub fn retrieve_by_vector(
        &self,
        vector: &[f32],
        top_k: usize,
        scope: Option<&AuthScope>,
    ) -> RetrievalOutcome {
        self.retrieval.retrieve_by_vector(vector, top_k, scope, None)
    }

    pub async fn search_episodes(
        &self,
        query: &str,
        scope: Option<&AuthScope>,
        top_k: Option<usize>,
    ) -> EngramResult<EpisodeOutcome> {
        self.retrieval.search_episodes(query, scope, top_k).await
    }

    pub fn recall(
        &self,
        window: &RecallWindow,
        scope: Option<&AuthScope>,
        top_k: Option<usize>,
    ) -> RetrievalOutcome {
        self.retrieval.recall(window, scope, top_k)
    }

    /// Fetch one published node. Inactive nodes and nodes outside `scope`
    /// read as absent.
    pub fn get_node(&self, id: &str, scope: Option<&AuthScope>) -> EngramResult<Option<InteractionNode>> {
        let scope = scope.ok_or(AuthorizationError::MissingScope)?;
        let snapshot = self.retrieval.snapshot();
        Ok(snapshot
            .node(id)
            .filter(|n| n.active && n.scope.overlaps(scope))
            .cloned())
    }

    /// Fetch one stored episode, read through to the store.
    pub fn get_episode(&self, id: &str, scope: Option<&AuthScope>) -> EngramResult<Option<Episode>> {
        let scope = scope.ok_or(AuthorizationError::MissingScope)?;
        Ok(self
            .storage
            .get_episode(id)?
            .filter(|e| e.active && e.scope.overlaps(scope)))
    }

    /// Execute every directive in `text` under `scope`, in order. One
    /// failing directive does not stop the others.
    pub async fn run_directives(&self, text: &str, scope: Option<&AuthScope>) -> DirectiveRun {
        let parsed = parse_directives(text);
        let mut run = DirectiveRun {
            results: Vec::with_capacity(parsed.directives.len()),
            errors: parsed.errors,
        };
        for directive in parsed.directives {
            let output = self.run_directive(&directive, scope).await;
            if let Err(e) = &output {
                tracing::warn!(directive = directive.name(), error = %e, "directive failed");
            }
            run.results.push(DirectiveResult { directive, output });
        }
        run
    }

    /// Directives map onto the bare retriever contracts: no signal filter
    /// and the configured defaults for everything else.
    async fn run_directive(
        &self,
        directive: &Directive,
        scope: Option<&AuthScope>,
    ) -> EngramResult<DirectiveOutput> {
        let lane = |query: &str, mode| RetrievalRequest::new(query, scope.cloned()).with_mode(mode);
        match directive {
            Directive::Vector(query) => self
                .retrieve_with(lane(query, RetrievalMode::VectorOnly))
                .await
                .map(DirectiveOutput::Nodes),
            Directive::Keyword(query) => self
                .retrieve_with(lane(query, RetrievalMode::KeywordOnly))
                .await
                .map(DirectiveOutput::Nodes),
            Directive::Episodes(query) => self
                .search_episodes(query, scope, None)
                .await
                .map(DirectiveOutput::Episodes),
            Directive::Recall(window) => Ok(DirectiveOutput::Nodes(self.recall(window, scope, None))),
        }
    }

    fn profile_for(&self, query: &str) -> FilterProfile {
        let enrichment = self.enricher.enrich(query, "");
        FilterProfile::from_signals(&enrichment.signals, &enrichment.tags)
    }

    // ── ingestion ───────────────────────────────────────────────────────

    pub async fn ingest(&self, item: RawInteraction, scope: Option<AuthScope>) -> EngramResult<IngestOutcome> {
        self.ingestion.ingest(item, scope).await
    }

    pub async fn ingest_reasoning(
        &self,
        trace: ReasoningTrace,
        scope: Option<AuthScope>,
    ) -> EngramResult<IngestOutcome> {
        self.ingestion.ingest_reasoning(trace, scope).await
    }

    pub async fn close_conversation(
        &self,
        conversation_id: &str,
        scope: Option<AuthScope>,
    ) -> EngramResult<Option<Episode>> {
        self.ingestion.close_conversation(conversation_id, scope).await
    }

    pub async fn deactivate(&self, node_id: &str, scope: Option<AuthScope>) -> EngramResult<()> {
        self.ingestion.deactivate(node_id, scope).await
    }

    pub async fn flush(&self) -> EngramResult<FlushReport> {
        self.ingestion.flush().await
    }

    pub async fn recluster(&self) -> EngramResult<ReclusterReport> {
        self.ingestion.recluster().await
    }

    pub fn is_halted(&self) -> bool {
        self.ingestion.is_halted()
    }

    /// Flush what is buffered and stop the worker. Later ingestion calls
    /// fail with `WorkerStopped`; queries keep reading the last snapshot.
    pub async fn shutdown(&self) -> EngramResult<FlushReport> {
        let report = self.ingestion.shutdown().await;
        let worker = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "ingestion worker panicked");
            }
        }
        report
    }
}
