use std::sync::Arc;

use engram_core::config::EmbeddingConfig;
use engram_core::errors::{EmbeddingError, EngramError, ErrorClass};
use engram_core::traits::IEmbeddingProvider;
use engram_embeddings::cache::CacheCoordinator;
use engram_embeddings::{EmbeddingEngine, HashedProvider};
use test_fixtures::{FlakyProvider, TableProvider};

fn config(dims: usize) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: "hashed".into(),
        dimensions: dims,
        max_retries: 2,
        initial_backoff_ms: 1,
        max_backoff_ms: 2,
        l2_cache_enabled: false,
        ..EmbeddingConfig::default()
    }
}

fn engine_with(provider: Arc<FlakyProvider>, dims: usize) -> EmbeddingEngine {
    let cfg = config(dims);
    EmbeddingEngine::with_provider(&cfg, Box::new(provider), CacheCoordinator::in_memory(&cfg))
        .unwrap()
}

#[test]
fn cache_hit_skips_provider() {
    let provider = Arc::new(FlakyProvider::new(HashedProvider::new(32)));
    let engine = engine_with(provider.clone(), 32);

    let a = engine.embed_text("Reset my password").unwrap();
    let b = engine.embed_text("reset   my PASSWORD").unwrap();
    assert_eq!(a, b);
    assert_eq!(provider.calls(), 1);
}

#[test]
fn rate_limit_is_retried_then_succeeds() {
    let provider = Arc::new(FlakyProvider::new(HashedProvider::new(32)).rate_limited_for(2));
    let engine = engine_with(provider.clone(), 32);

    let v = engine.embed_text("hello world").unwrap();
    assert_eq!(v.len(), 32);
    assert_eq!(provider.calls(), 3);
}

#[test]
fn exhausted_retries_surface_as_temporarily_unavailable() {
    let provider = Arc::new(FlakyProvider::new(HashedProvider::new(32)));
    provider.set_down(true);
    let engine = engine_with(provider.clone(), 32);

    let err = engine.embed_text("hello world").unwrap_err();
    assert_eq!(err.class(), ErrorClass::Transient);
    assert!(matches!(
        err,
        EngramError::EmbeddingError(EmbeddingError::TemporarilyUnavailable { attempts: 3, .. })
    ));
}

#[test]
fn batch_failure_is_per_item() {
    let provider = Arc::new(
        FlakyProvider::new(HashedProvider::new(32))
            .rejecting("poison")
            .wrong_dims_for("oversized"),
    );
    let engine = engine_with(provider, 32);

    let texts = vec![
        "first good text".to_string(),
        "this one is poison".to_string(),
        "".to_string(),
        "an oversized vector".to_string(),
        "second good text".to_string(),
    ];
    let results = engine.embed_texts(&texts);
    assert_eq!(results.len(), 5);
    assert!(results[0].is_ok());
    assert_eq!(results[1].as_ref().unwrap_err().class(), ErrorClass::PermanentItem);
    assert_eq!(results[2].as_ref().unwrap_err().class(), ErrorClass::PermanentItem);
    assert!(matches!(
        results[3].as_ref().unwrap_err(),
        EngramError::EmbeddingError(EmbeddingError::DimensionMismatch { expected: 32, actual: 33 })
    ));
    assert!(results[4].is_ok());
}

#[test]
fn batch_retries_only_transient_items() {
    let provider = Arc::new(FlakyProvider::new(HashedProvider::new(16)).rate_limited_for(1));
    let engine = engine_with(provider.clone(), 16);

    let texts: Vec<String> = (0..4).map(|i| format!("text number {i}")).collect();
    let results = engine.embed_texts(&texts);
    assert!(results.iter().all(|r| r.is_ok()));
    // One rate-limited request, one successful retry.
    assert_eq!(provider.calls(), 2);

    // Everything is cached now.
    let again = engine.embed_texts(&texts);
    assert!(again.iter().all(|r| r.is_ok()));
    assert_eq!(provider.calls(), 2);
}

#[test]
fn outputs_are_unit_length() {
    let cfg = config(4);
    let provider = TableProvider::new(4).with("raw", vec![3.0, 4.0, 0.0, 0.0]);
    let engine =
        EmbeddingEngine::with_provider(&cfg, Box::new(provider), CacheCoordinator::in_memory(&cfg))
            .unwrap();
    let v = engine.embed_text("raw").unwrap();
    assert!((v[0] - 0.6).abs() < 1e-6);
    assert!((v[1] - 0.8).abs() < 1e-6);
}

#[test]
fn mismatched_provider_is_refused_at_construction() {
    let cfg = config(64);
    let result = EmbeddingEngine::with_provider(
        &cfg,
        Box::new(HashedProvider::new(32)),
        CacheCoordinator::in_memory(&cfg),
    );
    assert_eq!(result.err().map(|e| e.class()), Some(ErrorClass::Fatal));
}

#[test]
fn engine_is_usable_as_a_provider() {
    let cfg = config(16);
    let engine: Box<dyn IEmbeddingProvider> = Box::new(EmbeddingEngine::new(&cfg, None).unwrap());
    assert_eq!(engine.dimensions(), 16);
    assert_eq!(engine.name(), "hashed");
    assert!(engine.embed("something").is_ok());
}
