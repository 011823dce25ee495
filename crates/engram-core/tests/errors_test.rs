use engram_core::errors::*;

#[test]
fn transient_errors_are_classified_transient() {
    let cases: Vec<EngramError> = vec![
        EmbeddingError::RateLimited {
            provider: "http".into(),
        }
        .into(),
        EmbeddingError::Timeout {
            provider: "http".into(),
            timeout_ms: 100,
        }
        .into(),
        EmbeddingError::TemporarilyUnavailable {
            attempts: 3,
            reason: "429".into(),
        }
        .into(),
        IngestionError::QueueFull.into(),
    ];
    for err in cases {
        assert_eq!(err.class(), ErrorClass::Transient, "{err}");
        assert!(err.is_transient());
    }
}

#[test]
fn per_item_errors_do_not_escalate() {
    let err: EngramError = EmbeddingError::DimensionMismatch {
        expected: 384,
        actual: 512,
    }
    .into();
    assert_eq!(err.class(), ErrorClass::PermanentItem);
    assert_eq!(err.to_string(), "embedding error: dimension mismatch: expected 384, got 512");

    let err: EngramError = IngestionError::MalformedItem {
        reason: "empty".into(),
    }
    .into();
    assert_eq!(err.class(), ErrorClass::PermanentItem);
}

#[test]
fn consistency_and_fatal_are_distinct() {
    let dangling: EngramError = ConsistencyError::DanglingFingerprint {
        fingerprint: "abc".into(),
        node_id: "n1".into(),
    }
    .into();
    assert_eq!(dangling.class(), ErrorClass::Consistency);

    let global: EngramError = ConsistencyError::CorpusDimensionMismatch {
        stored: 384,
        configured: 768,
    }
    .into();
    assert_eq!(global.class(), ErrorClass::Fatal);
    assert!(global.is_fatal());

    let unreachable: EngramError = StorageError::Unreachable {
        reason: "disk gone".into(),
    }
    .into();
    assert_eq!(unreachable.class(), ErrorClass::Fatal);
}

#[test]
fn authorization_errors_are_their_own_class() {
    let err: EngramError = AuthorizationError::MissingScope.into();
    assert_eq!(err.class(), ErrorClass::Authorization);
    assert_eq!(err.class().as_str(), "authorization");
}
