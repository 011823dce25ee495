//! File backend: restart survival and recovery from torn writes.

use std::fs::OpenOptions;
use std::io::Write;

use engram_core::errors::ErrorClass;
use engram_core::models::{IndexKind, RecordKind};
use engram_core::traits::ICorpusStorage;
use engram_storage::file::CorpusLayout;
use engram_storage::FileCorpusStore;
use test_fixtures::builders::{make_node, tenant_scope, unit_vector};

#[test]
fn corpus_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FileCorpusStore::open(dir.path()).unwrap();
        store
            .append_nodes(&[make_node("a", "p", "r", tenant_scope("t"), unit_vector(4, 1))])
            .unwrap();
        store.write_index(IndexKind::Clusters, b"{}").unwrap();
    }
    let store = FileCorpusStore::open(dir.path()).unwrap();
    let manifest = store.manifest().unwrap();
    assert_eq!(manifest.node_count, 1);
    assert_eq!(manifest.dimensions, Some(4));
    assert_eq!(manifest.corpus_version, 2);
    assert_eq!(store.get_node("a").unwrap().unwrap().embedding, unit_vector(4, 1));
    assert!(store.read_index(IndexKind::Clusters).unwrap().is_some());

    let layout = CorpusLayout::new(dir.path());
    assert!(layout.records(RecordKind::Node).exists());
    assert!(layout.vectors(RecordKind::Node).exists());
    assert!(layout.manifest().exists());
}

#[test]
fn torn_record_append_is_dropped_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FileCorpusStore::open(dir.path()).unwrap();
        store
            .append_nodes(&[make_node("a", "p", "r", tenant_scope("t"), unit_vector(4, 1))])
            .unwrap();
    }
    let layout = CorpusLayout::new(dir.path());
    let mut f = OpenOptions::new()
        .append(true)
        .open(layout.records(RecordKind::Node))
        .unwrap();
    f.write_all(b"{\"id\":\"b\",\"conver").unwrap();

    let store = FileCorpusStore::open(dir.path()).unwrap();
    assert_eq!(store.load_nodes().unwrap().len(), 1);
}

#[test]
fn records_without_vectors_surface_as_consistency_errors() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FileCorpusStore::open(dir.path()).unwrap();
        store
            .append_nodes(&[
                make_node("a", "p", "r", tenant_scope("t"), unit_vector(4, 1)),
                make_node("b", "q", "r", tenant_scope("t"), unit_vector(4, 2)),
            ])
            .unwrap();
    }
    // Simulate a crash between the record append and the vector append.
    let layout = CorpusLayout::new(dir.path());
    let path = layout.vectors(RecordKind::Node);
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 16]).unwrap();

    let store = FileCorpusStore::open(dir.path()).unwrap();
    let err = store.load_nodes().unwrap_err();
    assert_eq!(err.class(), ErrorClass::Consistency);
    assert_eq!(store.load_node_records().unwrap().len(), 2);

    // Repair by rewriting the whole array.
    store
        .write_vectors(RecordKind::Node, &[unit_vector(4, 1), unit_vector(4, 2)])
        .unwrap();
    assert_eq!(store.load_nodes().unwrap().len(), 2);
}

#[test]
fn orphan_vector_rows_are_truncated() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FileCorpusStore::open(dir.path()).unwrap();
        store
            .append_nodes(&[make_node("a", "p", "r", tenant_scope("t"), unit_vector(2, 0))])
            .unwrap();
    }
    let layout = CorpusLayout::new(dir.path());
    let mut f = OpenOptions::new()
        .append(true)
        .open(layout.vectors(RecordKind::Node))
        .unwrap();
    f.write_all(&[0u8; 8]).unwrap();
    drop(f);

    let store = FileCorpusStore::open(dir.path()).unwrap();
    assert_eq!(store.read_vectors(RecordKind::Node).unwrap().len(), 1);
    store
        .append_nodes(&[make_node("b", "q", "r", tenant_scope("t"), unit_vector(2, 1))])
        .unwrap();
    let loaded = store.load_nodes().unwrap();
    assert_eq!(loaded[1].embedding, unit_vector(2, 1));
}
