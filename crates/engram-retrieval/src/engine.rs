//! RetrievalEngine: scoped hybrid search over the current snapshot.
//!
//! query ─► scope ─► fast filter ─┬─► semantic lane (embed + cosine) ─┬─► RRF ─► hits
//!                                └─► keyword lane (BM25)            ─┘
//!
//! Both lanes run concurrently under one deadline. A lane that misses it
//! is dropped and the outcome is marked partial; only when every lane
//! misses does the call fail.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;

use engram_core::config::{FilterConfig, RetrievalConfig};
use engram_core::constants::MAX_TOP_K;
use engram_core::errors::{EngramError, EngramResult, RetrievalError};
use engram_core::models::{
    AuthScope, Episode, InteractionNode, Lane, Provenance, RetrievalMode, RetrievalStatus,
};
use engram_core::traits::IEmbeddingProvider;
use engram_observability::tracing_setup::events;
use engram_observability::EngineMetrics;

use crate::directives::RecallWindow;
use crate::filter::{FastFilter, FilterProfile};
use crate::fusion::{fuse, LaneRanking, RrfParams};
use crate::keyword::{Bm25Params, KeywordHit, KeywordQuery};
use crate::snapshot::{CorpusSnapshot, SnapshotCell};
use crate::vector::{EpisodeRetriever, InteractionRetriever};

/// Receives the ids of nodes returned to a caller. Implementations must
/// not block the query path.
pub trait IAccessRecorder: Send + Sync {
    fn record_access(&self, node_ids: Vec<String>);
}

#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub query: String,
    /// Required for any result; `None` yields an unauthorized outcome.
    pub scope: Option<AuthScope>,
    pub top_k: Option<usize>,
    pub mode: RetrievalMode,
    pub timeout: Option<Duration>,
    pub profile: FilterProfile,
    /// Overrides the interaction similarity threshold.
    pub threshold: Option<f64>,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>, scope: Option<AuthScope>) -> Self {
        Self {
            query: query.into(),
            scope,
            top_k: None,
            mode: RetrievalMode::default(),
            timeout: None,
            profile: FilterProfile::empty(),
            threshold: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_mode(mut self, mode: RetrievalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_profile(mut self, profile: FilterProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

#[derive(Debug, Clone)]
pub struct RetrievedHit {
    pub node: InteractionNode,
    /// RRF score in fused mode, the lane's own score otherwise.
    pub score: f64,
    pub similarity: Option<f64>,
    pub keyword_score: Option<f64>,
    pub lanes: Provenance,
}

#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub status: RetrievalStatus,
    /// True when a lane missed the deadline or failed.
    pub partial: bool,
    pub hits: Vec<RetrievedHit>,
    pub snapshot_version: u64,
    /// Whether the fast filter narrowed the candidate set.
    pub filter_applied: bool,
}

impl RetrievalOutcome {
    fn unauthorized(snapshot_version: u64) -> Self {
        Self {
            status: RetrievalStatus::Unauthorized,
            partial: false,
            hits: Vec::new(),
            snapshot_version,
            filter_applied: false,
        }
    }

    fn from_hits(hits: Vec<RetrievedHit>, partial: bool, snapshot_version: u64) -> Self {
        Self {
            status: status_of(hits.len()),
            partial,
            hits,
            snapshot_version,
            filter_applied: false,
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.node.id.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct EpisodeHit {
    pub episode: Episode,
    pub similarity: f64,
}

#[derive(Debug, Clone)]
pub struct EpisodeOutcome {
    pub status: RetrievalStatus,
    pub hits: Vec<EpisodeHit>,
    pub snapshot_version: u64,
}

fn status_of(hits: usize) -> RetrievalStatus {
    if hits == 0 {
        RetrievalStatus::NoMatches
    } else {
        RetrievalStatus::Ok
    }
}

#[derive(Debug, Clone)]
struct SemanticHit {
    id: String,
    similarity: f64,
    score: f64,
}

enum LaneResult<T> {
    Done(T),
    TimedOut,
    Failed(EngramError),
}

async fn await_lane<T>(
    handle: JoinHandle<EngramResult<T>>,
    deadline: Instant,
    lane: Lane,
) -> LaneResult<T> {
    match tokio::time::timeout_at(deadline, handle).await {
        Err(_) => LaneResult::TimedOut,
        Ok(Err(join)) => LaneResult::Failed(
            RetrievalError::LaneFailed {
                lane: lane.to_string(),
                reason: join.to_string(),
            }
            .into(),
        ),
        Ok(Ok(Err(e))) => LaneResult::Failed(e),
        Ok(Ok(Ok(value))) => LaneResult::Done(value),
    }
}

pub struct RetrievalEngine {
    snapshots: Arc<SnapshotCell>,
    embedder: Arc<dyn IEmbeddingProvider>,
    config: RetrievalConfig,
    filter: FastFilter,
    metrics: Arc<EngineMetrics>,
    access: Option<Arc<dyn IAccessRecorder>>,
}

impl RetrievalEngine {
    pub fn new(
        snapshots: Arc<SnapshotCell>,
        embedder: Arc<dyn IEmbeddingProvider>,
        config: RetrievalConfig,
        filter: FilterConfig,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            snapshots,
            embedder,
            config,
            filter: FastFilter::new(filter),
            metrics,
            access: None,
        }
    }

    /// Report returned node ids to `recorder` after each query.
    pub fn with_access_recorder(mut self, recorder: Arc<dyn IAccessRecorder>) -> Self {
        self.access = Some(recorder);
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<CorpusSnapshot> {
        self.snapshots.load()
    }

    fn top_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.config.default_top_k)
            .clamp(1, MAX_TOP_K)
    }

    fn timeout(&self, requested: Option<Duration>) -> Duration {
        requested.unwrap_or(Duration::from_millis(self.config.query_timeout_ms))
    }

    fn refuse(&self, query: &str, snapshot: &CorpusSnapshot) -> RetrievalOutcome {
        self.metrics.retrieval.record_unauthorized();
        events::unauthorized_query(query.len());
        RetrievalOutcome::unauthorized(snapshot.version())
    }

    /// Run a hybrid query against the current snapshot.
    pub async fn retrieve(&self, request: RetrievalRequest) -> EngramResult<RetrievalOutcome> {
        let top_k = self.top_k(request.top_k);
        let span = engram_observability::retrieval_span!(request.mode, top_k);
        self.run(request, top_k).instrument(span).await
    }

    async fn run(&self, request: RetrievalRequest, top_k: usize) -> EngramResult<RetrievalOutcome> {
        let snapshot = self.snapshots.load();
        let Some(scope) = request.scope.as_ref() else {
            return Ok(self.refuse(&request.query, &snapshot));
        };
        if request.query.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery {
                reason: "empty query".into(),
            }
            .into());
        }

        let visible = snapshot.visible_nodes(scope);
        let filtered = self
            .filter
            .filter(&request.profile, &visible, snapshot.nodes());
        let candidates = Arc::new(filtered.survivors);
        let limit = top_k.max(self.config.lane_depth);
        let timeout = self.timeout(request.timeout);
        let deadline = Instant::now() + timeout;

        let wants_semantic = matches!(request.mode, RetrievalMode::Fused | RetrievalMode::VectorOnly);
        let wants_keyword = matches!(request.mode, RetrievalMode::Fused | RetrievalMode::KeywordOnly);

        let semantic = wants_semantic.then(|| {
            self.spawn_semantic(&snapshot, &candidates, &request.query, request.threshold, limit)
        });
        let keyword = wants_keyword
            .then(|| self.spawn_keyword(&snapshot, &candidates, &request.query, limit));

        let semantic = match semantic {
            Some(handle) => Some(await_lane(handle, deadline, Lane::Semantic).await),
            None => None,
        };
        let keyword = match keyword {
            Some(handle) => Some(await_lane(handle, deadline, Lane::Keyword).await),
            None => None,
        };

        let mut completed: Vec<&str> = Vec::new();
        let mut timed_out = false;
        let mut failure: Option<EngramError> = None;
        let mut semantic_hits: Option<Vec<SemanticHit>> = None;
        let mut keyword_hits: Option<Vec<KeywordHit>> = None;

        match semantic {
            Some(LaneResult::Done(hits)) => {
                completed.push(Lane::Semantic.as_str());
                semantic_hits = Some(hits);
            }
            Some(LaneResult::TimedOut) => timed_out = true,
            Some(LaneResult::Failed(e)) => {
                tracing::warn!(error = %e, "semantic lane failed");
                failure = Some(e);
            }
            None => {}
        }
        match keyword {
            Some(LaneResult::Done(hits)) => {
                completed.push(Lane::Keyword.as_str());
                keyword_hits = Some(hits);
            }
            Some(LaneResult::TimedOut) => timed_out = true,
            Some(LaneResult::Failed(e)) => {
                tracing::warn!(error = %e, "keyword lane failed");
                failure.get_or_insert(e);
            }
            None => {}
        }

        let requested = usize::from(wants_semantic) + usize::from(wants_keyword);
        if completed.is_empty() {
            return Err(match failure {
                Some(e) if !timed_out => e,
                _ => RetrievalError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }
                .into(),
            });
        }
        let partial = completed.len() < requested;
        if partial {
            events::partial_result(&completed, timeout.as_millis() as u64);
        }

        let hits = assemble(
            &snapshot,
            request.mode,
            semantic_hits,
            keyword_hits,
            RrfParams::from(&self.config),
            top_k,
        );
        let mut outcome = RetrievalOutcome::from_hits(hits, partial, snapshot.version());
        outcome.filter_applied = filtered.applied;

        self.metrics.retrieval.record_query(outcome.hits.len(), partial);
        self.report_access(&outcome);
        tracing::debug!(
            hits = outcome.hits.len(),
            partial,
            filter_applied = outcome.filter_applied,
            candidates = candidates.len(),
            "retrieval complete"
        );
        Ok(outcome)
    }

    fn spawn_semantic(
        &self,
        snapshot: &Arc<CorpusSnapshot>,
        candidates: &Arc<Vec<usize>>,
        query: &str,
        threshold: Option<f64>,
        limit: usize,
    ) -> JoinHandle<EngramResult<Vec<SemanticHit>>> {
        let snapshot = Arc::clone(snapshot);
        let candidates = Arc::clone(candidates);
        let embedder = Arc::clone(&self.embedder);
        let config = self.config.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || {
            let vector = embedder.embed(&query)?;
            let retriever =
                InteractionRetriever::new(snapshot.nodes(), &config).with_clusters(snapshot.clusters());
            Ok(retriever
                .rank(&vector, &candidates, threshold, limit)
                .into_iter()
                .map(|h| SemanticHit {
                    id: h.node.id.clone(),
                    similarity: h.similarity,
                    score: h.score,
                })
                .collect())
        })
    }

    fn spawn_keyword(
        &self,
        snapshot: &Arc<CorpusSnapshot>,
        candidates: &Arc<Vec<usize>>,
        query: &str,
        limit: usize,
    ) -> JoinHandle<EngramResult<Vec<KeywordHit>>> {
        let snapshot = Arc::clone(snapshot);
        let candidates = Arc::clone(candidates);
        let params = Bm25Params::from(&self.config);
        let query = KeywordQuery::parse(query);
        tokio::task::spawn_blocking(move || {
            let mut allowed = vec![false; snapshot.nodes().len()];
            for &i in candidates.iter() {
                allowed[i] = true;
            }
            Ok(snapshot.keywords().search(
                &query,
                params,
                |id| snapshot.position(id).is_some_and(|p| allowed[p]),
                limit,
            ))
        })
    }

    /// Rank by a precomputed query vector, vector lane only. The same scope
    /// rules apply.
    pub fn retrieve_by_vector(
        &self,
        query_vector: &[f32],
        top_k: usize,
        scope: Option<&AuthScope>,
        threshold: Option<f64>,
    ) -> RetrievalOutcome {
        let snapshot = self.snapshots.load();
        let Some(scope) = scope else {
            return self.refuse("", &snapshot);
        };
        let top_k = self.top_k(Some(top_k));
        let candidates = snapshot.visible_nodes(scope);
        let retriever = InteractionRetriever::new(snapshot.nodes(), &self.config)
            .with_clusters(snapshot.clusters());
        let hits: Vec<RetrievedHit> = retriever
            .rank(query_vector, &candidates, threshold, top_k)
            .into_iter()
            .enumerate()
            .map(|(i, h)| RetrievedHit {
                node: h.node.clone(),
                score: h.score,
                similarity: Some(h.similarity),
                keyword_score: None,
                lanes: Provenance {
                    semantic_rank: Some(i + 1),
                    keyword_rank: None,
                },
            })
            .collect();
        self.metrics.retrieval.record_query(hits.len(), false);
        let outcome = RetrievalOutcome::from_hits(hits, false, snapshot.version());
        self.report_access(&outcome);
        outcome
    }

    /// Episode-level semantic search.
    pub async fn search_episodes(
        &self,
        query: &str,
        scope: Option<&AuthScope>,
        top_k: Option<usize>,
    ) -> EngramResult<EpisodeOutcome> {
        let snapshot = self.snapshots.load();
        let Some(scope) = scope.cloned() else {
            self.metrics.retrieval.record_unauthorized();
            events::unauthorized_query(query.len());
            return Ok(EpisodeOutcome {
                status: RetrievalStatus::Unauthorized,
                hits: Vec::new(),
                snapshot_version: snapshot.version(),
            });
        };
        let top_k = self.top_k(top_k);
        let timeout = self.timeout(None);
        let embedder = Arc::clone(&self.embedder);
        let config = self.config.clone();
        let query = query.to_string();
        let snap = Arc::clone(&snapshot);

        let handle = tokio::task::spawn_blocking(move || -> EngramResult<Vec<EpisodeHit>> {
            let vector = embedder.embed(&query)?;
            let retriever = EpisodeRetriever::new(snap.episodes(), &config).with_ann(snap.ann());
            Ok(retriever
                .retrieve(&vector, top_k, Some(&scope), None)
                .into_iter()
                .map(|h| EpisodeHit {
                    episode: h.episode.clone(),
                    similarity: h.similarity,
                })
                .collect())
        });
        let hits = match await_lane(handle, Instant::now() + timeout, Lane::Semantic).await {
            LaneResult::Done(hits) => hits,
            LaneResult::Failed(e) => return Err(e),
            LaneResult::TimedOut => {
                return Err(RetrievalError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }
                .into())
            }
        };
        self.metrics.retrieval.record_query(hits.len(), false);
        Ok(EpisodeOutcome {
            status: status_of(hits.len()),
            hits,
            snapshot_version: snapshot.version(),
        })
    }

    /// Nodes created inside `window`, newest first, scope-filtered.
    pub fn recall(
        &self,
        window: &RecallWindow,
        scope: Option<&AuthScope>,
        top_k: Option<usize>,
    ) -> RetrievalOutcome {
        let snapshot = self.snapshots.load();
        let Some(scope) = scope else {
            return self.refuse("", &snapshot);
        };
        let (start, end) = window.bounds(Utc::now());
        let nodes = snapshot.nodes();
        let mut inside: Vec<&InteractionNode> = snapshot
            .visible_nodes(scope)
            .into_iter()
            .map(|i| &nodes[i])
            .filter(|n| n.created_at >= start && n.created_at <= end)
            .collect();
        inside.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        inside.truncate(self.top_k(top_k));

        let hits: Vec<RetrievedHit> = inside
            .into_iter()
            .map(|node| RetrievedHit {
                node: node.clone(),
                score: 1.0,
                similarity: None,
                keyword_score: None,
                lanes: Provenance::default(),
            })
            .collect();
        self.metrics.retrieval.record_query(hits.len(), false);
        RetrievalOutcome::from_hits(hits, false, snapshot.version())
    }

    fn report_access(&self, outcome: &RetrievalOutcome) {
        if outcome.hits.is_empty() {
            return;
        }
        if let Some(recorder) = &self.access {
            recorder.record_access(outcome.hits.iter().map(|h| h.node.id.clone()).collect());
        }
    }
}

/// Fuse whichever lanes completed and materialize the top hits.
fn assemble(
    snapshot: &CorpusSnapshot,
    mode: RetrievalMode,
    semantic: Option<Vec<SemanticHit>>,
    keyword: Option<Vec<KeywordHit>>,
    params: RrfParams,
    top_k: usize,
) -> Vec<RetrievedHit> {
    let mut lanes = Vec::with_capacity(2);
    if let Some(hits) = &semantic {
        lanes.push(LaneRanking::new(Lane::Semantic, hits.iter().map(|h| h.id.clone())));
    }
    if let Some(hits) = &keyword {
        lanes.push(LaneRanking::new(Lane::Keyword, hits.iter().map(|h| h.id.clone())));
    }
    let semantic = semantic.unwrap_or_default();
    let keyword = keyword.unwrap_or_default();

    fuse(&lanes, params)
        .into_iter()
        .filter_map(|candidate| {
            let node = snapshot.node(&candidate.id)?;
            let sem = semantic.iter().find(|h| h.id == candidate.id);
            let kw = keyword.iter().find(|h| h.id == candidate.id);
            let score = match mode {
                RetrievalMode::Fused => candidate.rrf_score,
                RetrievalMode::VectorOnly => sem.map_or(0.0, |h| h.score),
                RetrievalMode::KeywordOnly => kw.map_or(0.0, |h| h.score),
            };
            Some(RetrievedHit {
                node: node.clone(),
                score,
                similarity: sem.map(|h| h.similarity),
                keyword_score: kw.map(|h| h.score),
                lanes: candidate.provenance,
            })
        })
        .take(top_k)
        .collect()
}
