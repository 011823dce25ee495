//! End-to-end tests through the `Engram` facade.

use std::path::Path;
use std::sync::Arc;

use engram_core::config::StorageBackend;
use engram_core::errors::{
    AuthorizationError, EngramError, EngramResult, ErrorClass, IngestionError, StorageError,
};
use engram_core::models::{
    AuthScope, Episode, Fingerprint, IndexKind, InteractionNode, Manifest, RawInteraction,
    ReasoningTrace, RecordKind, RetrievalMode, RetrievalStatus,
};
use engram_core::traits::{ICorpusStorage, IEmbeddingProvider};
use engram_embeddings::HashedProvider;
use engram_runtime::{DirectiveOutput, Engram, EngramConfig, RetrievalRequest};
use engram_storage::FileCorpusStore;
use tempfile::TempDir;
use test_fixtures::{load_golden, owner_scope, scope_of, tenant_scope, test_config, TEST_DIMS};

fn config(dir: &Path) -> EngramConfig {
    let mut config = test_config(dir, StorageBackend::File);
    config.ingestion.flush_interval_ms = 60_000;
    config
}

async fn open(dir: &Path) -> Engram {
    Engram::open(config(dir)).await.unwrap()
}

fn exchange(id: &str, conv: &str, prompt: &str, response: &str) -> RawInteraction {
    RawInteraction::new(conv, prompt, response).with_id(id)
}

/// Keyword lane only, no signal filter.
async fn keyword(engram: &Engram, query: &str, scope: AuthScope) -> Vec<String> {
    let request = RetrievalRequest::new(query, Some(scope)).with_mode(RetrievalMode::KeywordOnly);
    let outcome = engram.retrieve_with(request).await.unwrap();
    outcome.ids().into_iter().map(str::to_string).collect()
}

/// Three acme exchanges, flushed.
async fn seeded(dir: &Path) -> Engram {
    let engram = open(dir).await;
    let scope = tenant_scope("acme");
    for (id, prompt, response) in [
        ("n1", "reset my password", "Open account settings and choose reset password."),
        ("n2", "export the quarterly revenue report", "Use the reports page and export to CSV."),
        ("n3", "rotate the database credentials", "Generate new credentials in the vault."),
    ] {
        engram
            .ingest(exchange(id, "c1", prompt, response), Some(scope.clone()))
            .await
            .unwrap();
    }
    engram.flush().await.unwrap();
    engram
}

#[tokio::test]
async fn golden_support_desk_never_leaks_across_tenants() {
    let dir = TempDir::new().unwrap();
    let mut config = config(dir.path());
    config.embedding.dimensions = 256;
    let engram = Engram::open(config).await.unwrap();

    let golden = load_golden("support_desk");
    for item in &golden.interactions {
        let raw = exchange(&item.id, &item.conversation_id, &item.prompt, &item.response);
        let scope = scope_of(item.owner_id.as_deref(), item.tenant_id.as_deref());
        let outcome = engram.ingest(raw, Some(scope)).await.unwrap();
        // Identical text under another tenant is its own record.
        assert!(!outcome.is_duplicate(), "{} was dropped", item.id);
    }
    engram.flush().await.unwrap();

    for query in &golden.queries {
        let scope = scope_of(query.owner_id.as_deref(), query.tenant_id.as_deref());
        let outcome = engram
            .retrieve_with(RetrievalRequest::new(&query.query, Some(scope.clone())))
            .await
            .unwrap();
        assert_eq!(outcome.status, RetrievalStatus::Ok, "query {:?}", query.query);
        let ids = outcome.ids();
        if let Some(top) = &query.expect_top {
            assert_eq!(ids.first().copied(), Some(top.as_str()), "query {:?}", query.query);
        }
        for absent in &query.expect_absent {
            assert!(!ids.contains(&absent.as_str()), "{absent} leaked into {:?}", query.query);
        }
        assert!(outcome.hits.iter().all(|h| h.node.scope.overlaps(&scope)));
    }
    engram.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_scope_is_refused_on_both_paths() {
    let dir = TempDir::new().unwrap();
    let engram = seeded(dir.path()).await;

    let err = engram
        .ingest(exchange("x", "c9", "hello", "world"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngramError::AuthorizationError(AuthorizationError::MissingScope)));
    assert_eq!(err.class(), ErrorClass::Authorization);

    let refused = engram
        .retrieve("reset password", None, None, RetrievalMode::Fused)
        .await
        .unwrap();
    assert_eq!(refused.status, RetrievalStatus::Unauthorized);
    assert!(refused.hits.is_empty());

    let empty = engram
        .retrieve("reset password", Some(tenant_scope("initech")), None, RetrievalMode::Fused)
        .await
        .unwrap();
    assert_eq!(empty.status, RetrievalStatus::NoMatches);
    assert_ne!(refused.status, empty.status);

    assert!(engram.get_node("n1", None).is_err());
    assert_eq!(engram.metrics().retrieval.unauthorized, 1);
}

#[tokio::test]
async fn fetched_nodes_always_carry_a_scope() {
    let dir = TempDir::new().unwrap();
    let engram = seeded(dir.path()).await;
    let acme = tenant_scope("acme");

    for id in ["n1", "n2", "n3"] {
        let node = engram.get_node(id, Some(&acme)).unwrap().unwrap();
        assert!(node.scope.owner_id().is_some() || node.scope.tenant_id().is_some());
    }
    assert!(engram.get_node("n1", Some(&tenant_scope("globex"))).unwrap().is_none());
    assert!(engram.get_node("missing", Some(&acme)).unwrap().is_none());
}

#[tokio::test]
async fn replaying_an_item_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let engram = seeded(dir.path()).await;
    let version = engram.snapshot_version();

    let again = engram
        .ingest(
            exchange("n1", "c1", "reset my password", "Open account settings and choose reset password."),
            Some(tenant_scope("acme")),
        )
        .await
        .unwrap();
    assert!(again.is_duplicate());
    let report = engram.flush().await.unwrap();
    assert_eq!(report.appended, 0);
    assert_eq!(engram.snapshot_version(), version);
    assert_eq!(engram.metrics().ingestion.duplicates, 1);
}

#[tokio::test]
async fn corpus_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let before = {
        let engram = seeded(dir.path()).await;
        let node = engram.get_node("n2", Some(&tenant_scope("acme"))).unwrap().unwrap();
        engram.shutdown().await.unwrap();
        node
    };

    let engram = open(dir.path()).await;
    assert!(engram.integrity_report().is_clean(), "{:?}", engram.integrity_report());
    assert_eq!(engram.integrity_report().nodes, 3);

    let acme = tenant_scope("acme");
    let after = engram.get_node("n2", Some(&acme)).unwrap().unwrap();
    assert_eq!(after.prompt, before.prompt);
    assert_eq!(after.embedding, before.embedding);

    let outcome = engram.retrieve_by_vector(&after.embedding, 1, Some(&acme));
    assert_eq!(outcome.ids(), vec!["n2"]);
    let similarity = outcome.hits[0].similarity.unwrap();
    assert!((similarity - 1.0).abs() < 1e-4, "self similarity {similarity}");

    // The dedup set came back too.
    let again = engram
        .ingest(
            exchange("other", "c2", "reset my password", "Open account settings and choose reset password."),
            Some(acme),
        )
        .await
        .unwrap();
    assert!(again.is_duplicate());
}

#[tokio::test]
async fn sqlite_backend_serves_the_same_api() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), StorageBackend::Sqlite);
    config.ingestion.flush_interval_ms = 60_000;
    {
        let engram = Engram::open(config.clone()).await.unwrap();
        engram
            .ingest(exchange("s1", "c1", "reset my password", "use the settings page"), Some(owner_scope("u1")))
            .await
            .unwrap();
        engram.shutdown().await.unwrap();
    }

    let engram = Engram::open(config).await.unwrap();
    assert!(engram.integrity_report().is_clean(), "{:?}", engram.integrity_report());
    assert_eq!(keyword(&engram, "password", owner_scope("u1")).await, vec!["s1"]);
    assert!(keyword(&engram, "password", owner_scope("u2")).await.is_empty());
}

#[tokio::test]
async fn deactivated_nodes_disappear_from_every_read() {
    let dir = TempDir::new().unwrap();
    let engram = seeded(dir.path()).await;
    let acme = tenant_scope("acme");

    engram.deactivate("n1", Some(acme.clone())).await.unwrap();
    assert!(engram.get_node("n1", Some(&acme)).unwrap().is_none());
    assert!(keyword(&engram, "reset password", acme.clone()).await.is_empty());

    let err = engram.deactivate("n2", Some(tenant_scope("globex"))).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Authorization);
}

#[tokio::test]
async fn closed_conversation_is_searchable_as_an_episode() {
    let dir = TempDir::new().unwrap();
    let engram = seeded(dir.path()).await;
    let acme = tenant_scope("acme");

    let episode = engram.close_conversation("c1", Some(acme.clone())).await.unwrap().unwrap();
    assert_eq!(episode.node_ids, vec!["n1", "n2", "n3"]);
    assert_eq!(episode.embedding.len(), TEST_DIMS);

    let stored = engram.get_episode(&episode.id, Some(&acme)).unwrap().unwrap();
    assert_eq!(stored.conversation_id, "c1");
    assert!(engram.get_episode(&episode.id, Some(&tenant_scope("globex"))).unwrap().is_none());

    let found = engram
        .search_episodes(
            "reset my password export the quarterly revenue report rotate the database credentials",
            Some(&acme),
            None,
        )
        .await
        .unwrap();
    assert_eq!(found.hits.len(), 1);
    assert_eq!(found.hits[0].episode.id, episode.id);

    let hidden = engram
        .search_episodes("reset my password", Some(&tenant_scope("globex")), None)
        .await
        .unwrap();
    assert!(hidden.hits.is_empty());
}

#[tokio::test]
async fn reasoning_beyond_the_depth_limit_is_refused() {
    let dir = TempDir::new().unwrap();
    let engram = seeded(dir.path()).await;
    let acme = tenant_scope("acme");
    let max = engram.config().ingestion.max_reasoning_depth;

    let trace = |depth: u32| ReasoningTrace {
        conversation_id: "c1".into(),
        source_node_id: Some("n1".into()),
        question: format!("why did the reset email not arrive ({depth})"),
        steps: vec!["the mail queue was paused".into()],
        conclusion: "resume the queue".into(),
        depth,
    };

    let accepted = engram.ingest_reasoning(trace(1), Some(acme.clone())).await.unwrap();
    assert!(!accepted.is_duplicate());
    assert!(engram.ingest_reasoning(trace(max + 1), Some(acme)).await.is_err());
    assert_eq!(engram.metrics().ingestion.throttled, 1);

    engram.flush().await.unwrap();
    let node = engram
        .get_node(accepted.node_id(), Some(&tenant_scope("acme")))
        .unwrap()
        .unwrap();
    assert!(node.response.contains("resume the queue"));
}

#[tokio::test]
async fn directives_run_in_order_and_skip_bad_markers() {
    let dir = TempDir::new().unwrap();
    let engram = seeded(dir.path()).await;
    let acme = tenant_scope("acme");

    let text = "Checking [[keyword: password]] then [[recall: 1d]] and [[teleport: home]] \
                plus [[episodes: password]].";
    let run = engram.run_directives(text, Some(&acme)).await;

    let names: Vec<&str> = run.results.iter().map(|r| r.directive.name()).collect();
    assert_eq!(names, vec!["keyword", "recall", "episodes"]);
    assert_eq!(run.errors.len(), 1);
    assert!(run.errors[0].marker.contains("teleport"));

    match run.results[0].output.as_ref().unwrap() {
        DirectiveOutput::Nodes(outcome) => assert_eq!(outcome.ids(), vec!["n1"]),
        other => panic!("unexpected output {other:?}"),
    }
    match run.results[1].output.as_ref().unwrap() {
        DirectiveOutput::Nodes(outcome) => assert_eq!(outcome.hits.len(), 3),
        other => panic!("unexpected output {other:?}"),
    }
    assert!(run.results[2].output.as_ref().unwrap().is_empty());

    let unscoped = engram.run_directives("[[recall: 1d]]", None).await;
    match unscoped.results[0].output.as_ref().unwrap() {
        DirectiveOutput::Nodes(outcome) => assert_eq!(outcome.status, RetrievalStatus::Unauthorized),
        other => panic!("unexpected output {other:?}"),
    }
}

#[tokio::test]
async fn recluster_keeps_every_node_retrievable() {
    let dir = TempDir::new().unwrap();
    let engram = seeded(dir.path()).await;
    let version = engram.snapshot_version();

    let report = engram.recluster().await.unwrap();
    assert!(report.corpus_version >= version);

    let outcome = engram
        .recall(
            &engram_retrieval::RecallWindow::Last(chrono::Duration::days(1)),
            Some(&tenant_scope("acme")),
            None,
        );
    assert_eq!(outcome.hits.len(), 3);
}

// ── startup integrity ──────────────────────────────────────────────────

async fn seeded_then_closed(dir: &Path) {
    let engram = seeded(dir).await;
    engram.shutdown().await.unwrap();
}

#[tokio::test]
async fn corrupt_keyword_index_is_rebuilt_on_open() {
    let dir = TempDir::new().unwrap();
    seeded_then_closed(dir.path()).await;
    {
        let store = FileCorpusStore::open(dir.path()).unwrap();
        store.write_index(IndexKind::Keywords, b"{ not an index").unwrap();
    }

    let engram = open(dir.path()).await;
    assert!(engram.integrity_report().rebuilt("keywords"));
    assert_eq!(engram.metrics().ingestion.index_rebuilds, 1);

    assert_eq!(keyword(&engram, "password", tenant_scope("acme")).await, vec!["n1"]);

    // The repaired index was written back.
    drop(engram);
    let reopened = open(dir.path()).await;
    assert!(!reopened.integrity_report().rebuilt("keywords"));
}

#[tokio::test]
async fn missing_vector_rows_are_recomputed() {
    let dir = TempDir::new().unwrap();
    seeded_then_closed(dir.path()).await;
    let original = {
        let store = FileCorpusStore::open(dir.path()).unwrap();
        let rows = store.read_vectors(RecordKind::Node).unwrap();
        store.write_vectors(RecordKind::Node, &rows[..1]).unwrap();
        rows
    };

    let engram = open(dir.path()).await;
    assert!(engram.integrity_report().rebuilt("node_vectors"));
    let acme = tenant_scope("acme");
    for (i, id) in ["n1", "n2", "n3"].into_iter().enumerate() {
        let node = engram.get_node(id, Some(&acme)).unwrap().unwrap();
        assert_eq!(node.embedding.len(), TEST_DIMS);
        for (a, b) in node.embedding.iter().zip(&original[i]) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}

#[tokio::test]
async fn dangling_fingerprints_are_replaced() {
    let dir = TempDir::new().unwrap();
    seeded_then_closed(dir.path()).await;
    {
        let store = FileCorpusStore::open(dir.path()).unwrap();
        let mut fingerprints = store.load_fingerprints().unwrap();
        fingerprints.push(Fingerprint {
            hash: "feedface".into(),
            node_id: "ghost".into(),
        });
        store.replace_fingerprints(&fingerprints).unwrap();
    }

    let engram = open(dir.path()).await;
    assert!(engram.integrity_report().rebuilt("fingerprints"));
    drop(engram);

    let store = FileCorpusStore::open(dir.path()).unwrap();
    let fingerprints = store.load_fingerprints().unwrap();
    assert_eq!(fingerprints.len(), 3);
    assert!(fingerprints.iter().all(|f| f.node_id != "ghost"));
}

#[tokio::test]
async fn lost_cluster_state_is_retrained() {
    let dir = TempDir::new().unwrap();
    seeded_then_closed(dir.path()).await;
    {
        let store = FileCorpusStore::open(dir.path()).unwrap();
        store.write_index(IndexKind::Clusters, b"[]").unwrap();
    }

    let engram = open(dir.path()).await;
    assert!(engram.integrity_report().rebuilt("clusters"));
    assert_eq!(engram.integrity_report().nodes, 3);
}

#[tokio::test]
async fn dimension_change_blocks_startup() {
    let dir = TempDir::new().unwrap();
    seeded_then_closed(dir.path()).await;

    let mut config = config(dir.path());
    config.embedding.dimensions = TEST_DIMS * 2;
    let err = match Engram::open(config).await {
        Ok(_) => panic!("opened a corpus with the wrong dimension"),
        Err(e) => e,
    };
    assert!(err.is_fatal(), "{err}");
}

#[tokio::test]
async fn provider_dimension_must_match_config() {
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn ICorpusStorage> = Arc::new(FileCorpusStore::open(dir.path()).unwrap());
    let embedder: Arc<dyn IEmbeddingProvider> = Arc::new(HashedProvider::new(TEST_DIMS / 2));
    let result = Engram::open_with(config(dir.path()), embedder, storage).await;
    assert!(matches!(result, Err(EngramError::ConfigError(_))));
}

// ── fatal storage failure ──────────────────────────────────────────────

/// Delegates to a file store until `break_writes` is set.
struct BreakableStore {
    inner: FileCorpusStore,
    broken: std::sync::atomic::AtomicBool,
}

impl BreakableStore {
    fn check(&self) -> EngramResult<()> {
        if self.broken.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StorageError::Unreachable {
                reason: "disk detached".into(),
            }
            .into());
        }
        Ok(())
    }
}

impl ICorpusStorage for BreakableStore {
    fn manifest(&self) -> EngramResult<Manifest> {
        self.inner.manifest()
    }
    fn append_nodes(&self, nodes: &[InteractionNode]) -> EngramResult<()> {
        self.check()?;
        self.inner.append_nodes(nodes)
    }
    fn append_episodes(&self, episodes: &[Episode]) -> EngramResult<()> {
        self.check()?;
        self.inner.append_episodes(episodes)
    }
    fn get_node(&self, id: &str) -> EngramResult<Option<InteractionNode>> {
        self.inner.get_node(id)
    }
    fn get_episode(&self, id: &str) -> EngramResult<Option<Episode>> {
        self.inner.get_episode(id)
    }
    fn load_nodes(&self) -> EngramResult<Vec<InteractionNode>> {
        self.inner.load_nodes()
    }
    fn load_episodes(&self) -> EngramResult<Vec<Episode>> {
        self.inner.load_episodes()
    }
    fn load_node_records(&self) -> EngramResult<Vec<InteractionNode>> {
        self.inner.load_node_records()
    }
    fn load_episode_records(&self) -> EngramResult<Vec<Episode>> {
        self.inner.load_episode_records()
    }
    fn list_nodes_by_scope(&self, scope: &AuthScope) -> EngramResult<Vec<InteractionNode>> {
        self.inner.list_nodes_by_scope(scope)
    }
    fn read_vectors(&self, kind: RecordKind) -> EngramResult<Vec<Vec<f32>>> {
        self.inner.read_vectors(kind)
    }
    fn write_vectors(&self, kind: RecordKind, rows: &[Vec<f32>]) -> EngramResult<()> {
        self.check()?;
        self.inner.write_vectors(kind, rows)
    }
    fn update_nodes(&self, nodes: &[InteractionNode]) -> EngramResult<()> {
        self.check()?;
        self.inner.update_nodes(nodes)
    }
    fn update_episodes(&self, episodes: &[Episode]) -> EngramResult<()> {
        self.check()?;
        self.inner.update_episodes(episodes)
    }
    fn read_index(&self, kind: IndexKind) -> EngramResult<Option<Vec<u8>>> {
        self.inner.read_index(kind)
    }
    fn write_index(&self, kind: IndexKind, payload: &[u8]) -> EngramResult<()> {
        self.check()?;
        self.inner.write_index(kind, payload)
    }
    fn load_fingerprints(&self) -> EngramResult<Vec<Fingerprint>> {
        self.inner.load_fingerprints()
    }
    fn append_fingerprints(&self, fingerprints: &[Fingerprint]) -> EngramResult<()> {
        self.check()?;
        self.inner.append_fingerprints(fingerprints)
    }
    fn replace_fingerprints(&self, fingerprints: &[Fingerprint]) -> EngramResult<()> {
        self.check()?;
        self.inner.replace_fingerprints(fingerprints)
    }
    fn backend_name(&self) -> &str {
        "breakable"
    }
}

#[tokio::test]
async fn unreachable_store_halts_ingestion() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(BreakableStore {
        inner: FileCorpusStore::open(dir.path()).unwrap(),
        broken: std::sync::atomic::AtomicBool::new(false),
    });
    let embedder: Arc<dyn IEmbeddingProvider> = Arc::new(HashedProvider::new(TEST_DIMS));
    let storage: Arc<dyn ICorpusStorage> = store.clone();
    let engram = Engram::open_with(config(dir.path()), embedder, storage).await.unwrap();
    let acme = tenant_scope("acme");

    engram
        .ingest(exchange("n1", "c1", "reset my password", "use settings"), Some(acme.clone()))
        .await
        .unwrap();
    engram.flush().await.unwrap();

    store.broken.store(true, std::sync::atomic::Ordering::SeqCst);
    engram
        .ingest(exchange("n2", "c1", "export the report", "use the reports page"), Some(acme.clone()))
        .await
        .unwrap();
    let err = engram.flush().await.unwrap_err();
    assert!(err.is_fatal(), "{err}");
    assert!(engram.is_halted());

    let refused = engram
        .ingest(exchange("n3", "c1", "rotate keys", "use the vault"), Some(acme.clone()))
        .await
        .unwrap_err();
    assert!(matches!(refused, EngramError::EngineHalted { .. }));

    // Reads keep serving the last published snapshot.
    assert_eq!(keyword(&engram, "password", acme).await, vec!["n1"]);
}

#[tokio::test]
async fn shutdown_stops_the_worker() {
    let dir = TempDir::new().unwrap();
    let engram = open(dir.path()).await;
    engram
        .ingest(exchange("n1", "c1", "reset my password", "use settings"), Some(tenant_scope("acme")))
        .await
        .unwrap();
    let report = engram.shutdown().await.unwrap();
    assert_eq!(report.appended, 1);

    let err = engram
        .ingest(exchange("n2", "c1", "export", "reports page"), Some(tenant_scope("acme")))
        .await
        .unwrap_err();
    assert!(matches!(err, EngramError::IngestionError(IngestionError::WorkerStopped)));
}
