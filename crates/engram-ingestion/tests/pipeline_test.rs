//! Integration tests for the ingestion pipeline against the file store.

use std::sync::Arc;
use std::time::Duration;

use engram_clustering::StreamingClusterEngine;
use engram_core::config::{ClusteringConfig, IngestionConfig, RetrievalConfig};
use engram_core::constants::NODE_TEXT_SEPARATOR;
use engram_core::errors::{AuthorizationError, EngramError, ErrorClass, IngestionError};
use engram_core::models::{Origin, Outcome, RawInteraction, ReasoningTrace};
use engram_core::traits::{ICorpusStorage, IEmbeddingProvider};
use engram_ingestion::{
    spawn_pipeline, CorpusState, HeuristicSummarizer, IngestOutcome, IngestionHandle,
    PipelineParts,
};
use engram_observability::EngineMetrics;
use engram_retrieval::{CorpusSnapshot, SnapshotCell};
use engram_storage::FileCorpusStore;
use tempfile::TempDir;
use test_fixtures::builders::blend;
use test_fixtures::{tenant_scope, FlakyProvider, TableProvider, TEST_DIMS};

struct Harness {
    handle: IngestionHandle,
    snapshots: Arc<SnapshotCell>,
    storage: Arc<dyn ICorpusStorage>,
    metrics: Arc<EngineMetrics>,
    _dir: TempDir,
}

fn start(embedder: Arc<dyn IEmbeddingProvider>, tweak: impl FnOnce(&mut IngestionConfig)) -> Harness {
    start_clustered(embedder, tweak, ClusteringConfig::default())
}

fn start_clustered(
    embedder: Arc<dyn IEmbeddingProvider>,
    tweak: impl FnOnce(&mut IngestionConfig),
    clustering: ClusteringConfig,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn ICorpusStorage> = Arc::new(FileCorpusStore::open(dir.path()).unwrap());
    let mut ingestion = IngestionConfig {
        flush_interval_ms: 60_000,
        flush_count: 1_000,
        ..IngestionConfig::default()
    };
    tweak(&mut ingestion);
    let snapshots = Arc::new(SnapshotCell::new(CorpusSnapshot::empty(&clustering)));
    let metrics = Arc::new(EngineMetrics::new());
    let parts = PipelineParts {
        ingestion,
        retrieval: RetrievalConfig::default(),
        dimensions: TEST_DIMS,
        storage: Arc::clone(&storage),
        embedder,
        summarizer: Arc::new(HeuristicSummarizer::new()),
        snapshots: Arc::clone(&snapshots),
        metrics: Arc::clone(&metrics),
    };
    let state = CorpusState::empty(StreamingClusterEngine::new(clustering));
    let (handle, _task) = spawn_pipeline(parts, state);
    Harness {
        handle,
        snapshots,
        storage,
        metrics,
        _dir: dir,
    }
}

fn table() -> Arc<dyn IEmbeddingProvider> {
    Arc::new(TableProvider::new(TEST_DIMS))
}

fn exchange(conv: &str, prompt: &str) -> RawInteraction {
    RawInteraction::new(conv, prompt, format!("answer to: {prompt}"))
}

fn trace(conv: &str, source: Option<&str>, depth: u32) -> ReasoningTrace {
    ReasoningTrace {
        conversation_id: conv.into(),
        source_node_id: source.map(str::to_string),
        question: format!("why did the deploy fail at depth {depth}"),
        steps: vec!["the migration locked the table".into()],
        conclusion: "run migrations before the rollout".into(),
        depth,
    }
}

#[tokio::test]
async fn flushed_node_is_persisted_and_published() {
    let h = start(table(), |_| {});
    let outcome = h
        .handle
        .ingest(exchange("c1", "how do I rotate the api key").with_id("n1"), Some(tenant_scope("acme")))
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::Accepted { node_id: "n1".into() });
    assert!(h.snapshots.load().nodes().is_empty());

    let report = h.handle.flush().await.unwrap();
    assert_eq!(report.appended, 1);
    assert!(report.rejected.is_empty());

    let snapshot = h.snapshots.load();
    assert_eq!(snapshot.nodes().len(), 1);
    assert_eq!(snapshot.version(), report.corpus_version);
    let node = snapshot.node("n1").unwrap();
    assert_eq!(node.embedding.len(), TEST_DIMS);
    assert!(snapshot.keywords().contains("n1"));

    assert_eq!(h.storage.load_nodes().unwrap().len(), 1);
    let fingerprints = h.storage.load_fingerprints().unwrap();
    assert_eq!(fingerprints.len(), 1);
    assert_eq!(fingerprints[0].node_id, "n1");
}

#[tokio::test]
async fn same_content_in_same_scope_is_kept_once() {
    let h = start(table(), |_| {});
    let scope = tenant_scope("acme");
    let first = h.handle.ingest(exchange("c1", "reset my password"), Some(scope.clone())).await.unwrap();
    // Still buffered: the reservation catches it.
    let second = h.handle.ingest(exchange("c2", "reset my password"), Some(scope.clone())).await.unwrap();
    assert!(second.is_duplicate());
    assert_eq!(second.node_id(), first.node_id());

    h.handle.flush().await.unwrap();
    // Committed: the fingerprint set catches it.
    let third = h.handle.ingest(exchange("c3", "Reset my   password"), Some(scope)).await.unwrap();
    assert!(third.is_duplicate());
    h.handle.flush().await.unwrap();

    assert_eq!(h.snapshots.load().nodes().len(), 1);
    assert_eq!(h.metrics.snapshot().ingestion.duplicates, 2);
}

#[tokio::test]
async fn resubmitting_an_id_is_idempotent() {
    let h = start(table(), |_| {});
    let scope = tenant_scope("acme");
    h.handle.ingest(exchange("c1", "first text").with_id("n1"), Some(scope.clone())).await.unwrap();
    h.handle.flush().await.unwrap();
    let again = h
        .handle
        .ingest(exchange("c1", "different text").with_id("n1"), Some(scope))
        .await
        .unwrap();
    assert_eq!(again, IngestOutcome::Duplicate { existing_id: "n1".into() });
    let report = h.handle.flush().await.unwrap();
    assert_eq!(report.appended, 0);
    assert_eq!(h.storage.load_nodes().unwrap().len(), 1);
}

#[tokio::test]
async fn identical_text_in_other_tenant_is_separate() {
    let h = start(table(), |_| {});
    let a = h.handle.ingest(exchange("c1", "reset my password"), Some(tenant_scope("acme"))).await.unwrap();
    let b = h.handle.ingest(exchange("c2", "reset my password"), Some(tenant_scope("globex"))).await.unwrap();
    assert!(!a.is_duplicate());
    assert!(!b.is_duplicate());
    assert_eq!(h.handle.flush().await.unwrap().appended, 2);
}

#[tokio::test]
async fn missing_scope_is_refused_before_the_queue() {
    let h = start(table(), |_| {});
    let err = h.handle.ingest(exchange("c1", "anything"), None).await.unwrap_err();
    assert!(matches!(
        err,
        EngramError::AuthorizationError(AuthorizationError::MissingScope)
    ));
    assert_eq!(err.class(), ErrorClass::Authorization);
}

#[tokio::test]
async fn blank_exchange_is_malformed() {
    let h = start(table(), |_| {});
    let err = h
        .handle
        .ingest(RawInteraction::new("c1", "  ", ""), Some(tenant_scope("acme")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngramError::IngestionError(IngestionError::MalformedItem { .. })
    ));
    let err = h
        .handle
        .ingest(RawInteraction::new(" ", "prompt", "response"), Some(tenant_scope("acme")))
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::PermanentItem);
}

#[tokio::test]
async fn transient_failure_defers_then_lands() {
    let flaky = Arc::new(FlakyProvider::new(TableProvider::new(TEST_DIMS)).rate_limited_for(1));
    let h = start(flaky.clone(), |_| {});
    h.handle.ingest(exchange("c1", "deploy to staging").with_id("n1"), Some(tenant_scope("acme"))).await.unwrap();

    let first = h.handle.flush().await.unwrap();
    assert_eq!(first.appended, 0);
    assert_eq!(first.deferred, 1);
    assert!(h.snapshots.load().nodes().is_empty());

    let second = h.handle.flush().await.unwrap();
    assert_eq!(second.appended, 1);
    assert_eq!(second.deferred, 0);
    assert!(h.snapshots.load().node("n1").is_some());
    assert_eq!(flaky.calls(), 2);
}

#[tokio::test]
async fn outage_past_the_attempt_limit_keeps_the_item_queued() {
    let flaky = Arc::new(FlakyProvider::new(TableProvider::new(TEST_DIMS)));
    flaky.set_down(true);
    let h = start(flaky.clone(), |c| c.max_item_attempts = 2);
    let scope = tenant_scope("acme");
    h.handle
        .ingest(exchange("c1", "deploy to staging").with_id("n1"), Some(scope.clone()))
        .await
        .unwrap();

    for attempt in 1..=4 {
        let report = h.handle.flush().await.unwrap();
        assert_eq!(report.deferred, 1, "attempt {attempt}");
        assert!(report.rejected.is_empty(), "attempt {attempt}");
        assert_eq!(report.unavailable.len(), usize::from(attempt >= 2), "attempt {attempt}");
    }
    let metrics = h.metrics.snapshot().ingestion;
    assert_eq!(metrics.unavailable, 1);
    assert_eq!(metrics.rejected, 0);

    // Still reserved: the same content cannot slip in under another id.
    let again = h.handle.ingest(exchange("c1", "deploy to staging"), Some(scope)).await.unwrap();
    assert_eq!(again, IngestOutcome::Duplicate { existing_id: "n1".into() });

    flaky.recover();
    let report = h.handle.flush().await.unwrap();
    assert_eq!(report.appended, 1);
    assert_eq!(report.deferred, 0);
    assert!(report.unavailable.is_empty());
    assert!(h.snapshots.load().node("n1").is_some());
    assert_eq!(h.storage.load_fingerprints().unwrap().len(), 1);
}

#[tokio::test]
async fn interval_flushes_land_the_item_once_the_provider_recovers() {
    let flaky = Arc::new(FlakyProvider::new(TableProvider::new(TEST_DIMS)));
    flaky.set_down(true);
    let h = start(flaky.clone(), |c| {
        c.flush_interval_ms = 10;
        c.max_item_attempts = 2;
        c.max_retry_delay_ms = 40;
    });
    h.handle
        .ingest(exchange("c1", "deploy to staging").with_id("n1"), Some(tenant_scope("acme")))
        .await
        .unwrap();

    for _ in 0..200 {
        if h.metrics.snapshot().ingestion.deferred >= 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(h.metrics.snapshot().ingestion.deferred >= 4);
    assert!(h.snapshots.load().node("n1").is_none());

    flaky.recover();
    for _ in 0..200 {
        if h.snapshots.load().node("n1").is_some() {
            assert_eq!(h.metrics.snapshot().ingestion.rejected, 0);
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("deferred item never landed after the provider recovered");
}

/// Three tight topics of five exchanges each, registered with `provider`.
fn topic_exchanges(provider: &TableProvider) -> Vec<RawInteraction> {
    let mut items = Vec::new();
    for (axis, topic) in [(0, "borrow checker"), (20, "query planner"), (40, "pod rollout")] {
        for j in 0..5 {
            let item = exchange("c1", &format!("{topic} question {j}"));
            let text = format!("{}{}{}", item.prompt, NODE_TEXT_SEPARATOR, item.response);
            provider.insert(&text, blend(TEST_DIMS, &[(axis, 1.0), (axis + 1, 0.05 * (j as f32 + 1.0))]));
            items.push(item);
        }
    }
    items
}

async fn wait_for_clusters(h: &Harness) -> usize {
    for _ in 0..300 {
        let clustered = h
            .snapshots
            .load()
            .nodes()
            .iter()
            .filter(|n| n.cluster.cluster_id.is_some())
            .count();
        if clustered > 0 && h.metrics.snapshot().ingestion.reclusters > 0 {
            return clustered;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no scheduled recluster assigned a cluster");
}

#[tokio::test]
async fn full_candidate_pool_triggers_a_retrain() {
    let provider = Arc::new(TableProvider::new(TEST_DIMS));
    let items = topic_exchanges(&provider);
    let clustering = ClusteringConfig {
        recluster_candidates: items.len(),
        recluster_interval_ms: 0,
        ..ClusteringConfig::default()
    };
    let h = start_clustered(provider, |c| c.flush_interval_ms = 10, clustering);
    for item in items {
        h.handle.ingest(item, Some(tenant_scope("acme"))).await.unwrap();
    }

    let clustered = wait_for_clusters(&h).await;
    assert!(clustered >= 3);
    assert_eq!(h.metrics.snapshot().ingestion.reclusters, 1);
}

#[tokio::test]
async fn retrain_interval_clusters_a_cold_corpus() {
    let provider = Arc::new(TableProvider::new(TEST_DIMS));
    let items = topic_exchanges(&provider);
    let clustering = ClusteringConfig {
        recluster_candidates: 0,
        recluster_interval_ms: 30,
        ..ClusteringConfig::default()
    };
    let h = start_clustered(provider, |c| c.flush_interval_ms = 10, clustering);
    for item in items {
        h.handle.ingest(item, Some(tenant_scope("acme"))).await.unwrap();
    }

    wait_for_clusters(&h).await;
    while h.snapshots.load().nodes().len() < 15 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(80)).await;

    // Nothing new since: the interval alone does not retrain again.
    let done = h.metrics.snapshot().ingestion.reclusters;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.metrics.snapshot().ingestion.reclusters, done);
}

#[tokio::test]
async fn permanent_failure_drops_only_that_item() {
    let flaky = Arc::new(
        FlakyProvider::new(TableProvider::new(TEST_DIMS))
            .rejecting("poison")
            .wrong_dims_for("oversized"),
    );
    let h = start(flaky, |_| {});
    let scope = tenant_scope("acme");
    for (id, prompt) in [("ok", "a fine question"), ("bad", "a poison pill"), ("big", "an oversized vector")] {
        h.handle.ingest(exchange("c1", prompt).with_id(id), Some(scope.clone())).await.unwrap();
    }

    let report = h.handle.flush().await.unwrap();
    assert_eq!(report.appended, 1);
    let mut rejected: Vec<&str> = report.rejected.iter().map(|r| r.node_id.as_str()).collect();
    rejected.sort_unstable();
    assert_eq!(rejected, ["bad", "big"]);
    assert!(report.rejected.iter().all(|r| r.class == ErrorClass::PermanentItem));
    assert_eq!(h.snapshots.load().nodes().len(), 1);
    assert!(h.storage.load_fingerprints().unwrap().iter().all(|f| f.node_id == "ok"));
}

#[tokio::test]
async fn count_threshold_triggers_a_flush() {
    let h = start(table(), |c| c.flush_count = 2);
    let scope = tenant_scope("acme");
    h.handle.ingest(exchange("c1", "one"), Some(scope.clone())).await.unwrap();
    h.handle.ingest(exchange("c1", "two"), Some(scope)).await.unwrap();

    for _ in 0..100 {
        if h.snapshots.load().nodes().len() == 2 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("count-triggered flush never published");
}

#[tokio::test]
async fn reasoning_traces_are_bounded_by_depth() {
    let h = start(table(), |c| c.max_reasoning_depth = 2);
    let scope = tenant_scope("acme");

    let err = h.handle.ingest_reasoning(trace("c1", None, 3), Some(scope.clone())).await.unwrap_err();
    assert!(matches!(
        err,
        EngramError::IngestionError(IngestionError::ReasoningTooDeep { depth: 3, limit: 2 })
    ));

    let first = h.handle.ingest_reasoning(trace("c1", None, 2), Some(scope.clone())).await.unwrap();
    h.handle.flush().await.unwrap();
    let stored = h.snapshots.load();
    let node = stored.node(first.node_id()).unwrap();
    assert_eq!(node.origin, Origin::Reasoning { depth: 2 });
    assert!(node.response.contains("Conclusion: run migrations"));

    // Derived from a depth-2 node: depth 3 whatever the trace claims.
    let err = h
        .handle
        .ingest_reasoning(trace("c1", Some(first.node_id()), 0), Some(scope))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngramError::IngestionError(IngestionError::ReasoningTooDeep { depth: 3, .. })
    ));
    assert_eq!(h.metrics.snapshot().ingestion.throttled, 2);
}

#[tokio::test]
async fn reasoning_rate_is_throttled_per_conversation() {
    let h = start(table(), |c| c.reasoning_per_minute = 2);
    let scope = tenant_scope("acme");
    h.handle.ingest_reasoning(trace("c1", None, 0), Some(scope.clone())).await.unwrap();
    h.handle.ingest_reasoning(trace("c1", None, 1), Some(scope.clone())).await.unwrap();
    let err = h.handle.ingest_reasoning(trace("c1", None, 2), Some(scope.clone())).await.unwrap_err();
    assert!(err.is_transient());
    assert!(h.handle.ingest_reasoning(trace("c2", None, 2), Some(scope)).await.is_ok());
}

#[tokio::test]
async fn closing_a_conversation_stores_a_summarized_episode() {
    let h = start(table(), |_| {});
    let scope = tenant_scope("acme");
    let turns = [
        "this build is broken and I am frustrated",
        "how do I clear the cache",
        "thanks, that worked",
    ];
    for (i, prompt) in turns.iter().enumerate() {
        h.handle
            .ingest(exchange("c1", prompt).with_sequence(i as u32), Some(scope.clone()))
            .await
            .unwrap();
    }

    let episode = h.handle.close_conversation("c1", Some(scope.clone())).await.unwrap().unwrap();
    assert_eq!(episode.node_ids.len(), 3);
    let norm: f32 = episode.embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4);
    assert_eq!(h.storage.load_episodes().unwrap().len(), 1);

    // The summary is computed off the worker and lands with a later flush.
    let mut summary = None;
    for _ in 0..100 {
        h.handle.flush().await.unwrap();
        summary = h.snapshots.load().episodes()[0].summary.clone();
        if summary.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(summary.unwrap().outcome, Outcome::Resolved);

    // Closing again supersedes the first episode.
    let second = h.handle.close_conversation("c1", Some(scope)).await.unwrap().unwrap();
    let snapshot = h.snapshots.load();
    let active: Vec<&str> = snapshot
        .episodes()
        .iter()
        .filter(|e| e.active)
        .map(|e| e.id.as_str())
        .collect();
    assert_eq!(active, [second.id.as_str()]);
}

#[tokio::test]
async fn closing_respects_scope() {
    let h = start(table(), |_| {});
    h.handle.ingest(exchange("c1", "private question"), Some(tenant_scope("acme"))).await.unwrap();

    assert!(h.handle.close_conversation("unknown", Some(tenant_scope("acme"))).await.unwrap().is_none());
    let err = h
        .handle
        .close_conversation("c1", Some(tenant_scope("globex")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngramError::AuthorizationError(AuthorizationError::OutOfScope { .. })
    ));
    assert!(h.snapshots.load().episodes().is_empty());
}

#[tokio::test]
async fn deactivated_nodes_stay_but_go_inactive() {
    let h = start(table(), |_| {});
    let scope = tenant_scope("acme");
    h.handle.ingest(exchange("c1", "stale advice").with_id("n1"), Some(scope.clone())).await.unwrap();
    h.handle.deactivate("n1", Some(scope.clone())).await.unwrap();

    let snapshot = h.snapshots.load();
    assert!(!snapshot.node("n1").unwrap().active);
    let stored = h.storage.load_nodes().unwrap();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].active);

    let err = h.handle.deactivate("missing", Some(scope)).await.unwrap_err();
    assert!(matches!(err, EngramError::NodeNotFound { .. }));
    let err = h.handle.deactivate("n1", Some(tenant_scope("globex"))).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Authorization);
}

#[tokio::test]
async fn shutdown_flushes_the_buffer() {
    let h = start(table(), |_| {});
    h.handle.ingest(exchange("c1", "last words"), Some(tenant_scope("acme"))).await.unwrap();
    let report = h.handle.shutdown().await.unwrap();
    assert_eq!(report.appended, 1);
    assert_eq!(h.storage.load_nodes().unwrap().len(), 1);

    let err = h.handle.flush().await.unwrap_err();
    assert!(matches!(
        err,
        EngramError::IngestionError(IngestionError::WorkerStopped)
    ));
}
