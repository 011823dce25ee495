//! Property tests: scope listing and append order.

use proptest::prelude::*;

use engram_core::config::StorageConfig;
use engram_core::traits::ICorpusStorage;
use engram_storage::SqliteCorpusStore;
use test_fixtures::builders::{make_node, scope_of, unit_vector};

fn scope_strategy() -> impl Strategy<Value = (Option<String>, Option<String>)> {
    (
        prop::option::of(prop::sample::select(vec!["u1", "u2", "u3"])),
        prop::option::of(prop::sample::select(vec!["t1", "t2"])),
    )
        .prop_filter("at least one identifier", |(o, t)| o.is_some() || t.is_some())
        .prop_map(|(o, t)| (o.map(String::from), t.map(String::from)))
}

proptest! {
    #[test]
    fn prop_listing_only_returns_overlapping_scopes(
        scopes in prop::collection::vec(scope_strategy(), 1..20),
        query in scope_strategy(),
    ) {
        let store = SqliteCorpusStore::open_in_memory(&StorageConfig::default()).unwrap();
        let nodes: Vec<_> = scopes
            .iter()
            .enumerate()
            .map(|(i, (o, t))| {
                make_node(
                    &format!("n{i}"),
                    &format!("text {i}"),
                    "",
                    scope_of(o.as_deref(), t.as_deref()),
                    unit_vector(4, i),
                )
            })
            .collect();
        store.append_nodes(&nodes).unwrap();

        let q = scope_of(query.0.as_deref(), query.1.as_deref());
        let listed = store.list_nodes_by_scope(&q).unwrap();
        let expected: Vec<_> = nodes
            .iter()
            .filter(|n| n.scope.overlaps(&q))
            .map(|n| n.id.clone())
            .collect();
        let got: Vec<_> = listed.iter().map(|n| n.id.clone()).collect();
        prop_assert_eq!(got, expected);
        for node in &listed {
            prop_assert!(node.scope.owner_id().is_some() || node.scope.tenant_id().is_some());
        }
    }

    #[test]
    fn prop_loaded_vectors_stay_aligned(count in 1usize..30) {
        let dir = tempfile::tempdir().unwrap();
        let store = engram_storage::FileCorpusStore::open(dir.path()).unwrap();
        for i in 0..count {
            store
                .append_nodes(&[make_node(
                    &format!("n{i}"),
                    &format!("text {i}"),
                    "",
                    scope_of(Some("u"), None),
                    unit_vector(8, i),
                )])
                .unwrap();
        }
        let loaded = store.load_nodes().unwrap();
        prop_assert_eq!(loaded.len(), count);
        for (i, node) in loaded.iter().enumerate() {
            prop_assert_eq!(&node.embedding, &unit_vector(8, i));
        }
    }
}
