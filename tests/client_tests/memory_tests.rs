//! Tests for MemoryBackend
//!
//! These tests verify:
//! - Non-transactional and transactional commits
//! - Conflict detection between overlapping transactions
//! - Mutation limits and incomplete keys
//! - Injected commit failures
//! - Paging with cursors and offsets

use std::sync::Arc;

use docstore_bench::datastore::{
    Backend, EntityRecord, Key, MemoryBackend, Mutation, Properties, Query, Value,
    MAX_MUTATIONS_PER_COMMIT,
};
use docstore_bench::StoreError;

// =============================================================================
// Helper Functions
// =============================================================================

fn record(kind: &str, name: &str) -> EntityRecord {
    let mut properties = Properties::new();
    properties.insert("Name".to_string(), Value::from("Hoge"));
    EntityRecord::new(Key::new(kind, name), properties)
}

fn upsert(kind: &str, name: &str) -> Mutation {
    Mutation::Upsert(record(kind, name))
}

fn seed(store: &MemoryBackend, kind: &str, count: usize) {
    let mutations = (0..count).map(|i| upsert(kind, &format!("{:03}", i))).collect();
    store.commit(None, mutations).unwrap();
}

// =============================================================================
// Commit Tests
// =============================================================================

#[test]
fn test_new_store_is_empty() {
    let store = MemoryBackend::new();
    assert!(store.is_empty());
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.open_transactions(), 0);
}

#[test]
fn test_non_transactional_commit_and_get() {
    let store = MemoryBackend::new();

    store.commit(None, vec![upsert("K", "a"), upsert("K", "b")]).unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(store.commit_count(), 1);
    let loaded = store.get(&Key::new("K", "a")).unwrap().unwrap();
    assert_eq!(loaded, record("K", "a"));
}

#[test]
fn test_get_missing_key() {
    let store = MemoryBackend::new();
    assert_eq!(store.get(&Key::new("K", "nope")).unwrap(), None);
}

#[test]
fn test_stored_key_property_round_trips() {
    let store = MemoryBackend::new();
    let mut properties = Properties::new();
    properties.insert("Parent".to_string(), Value::Key(Key::new("P", "p")));
    properties.insert("Missing".to_string(), Value::Null);
    let entity = EntityRecord::new(Key::new("K", "a"), properties);

    store.commit(None, vec![Mutation::Upsert(entity.clone())]).unwrap();

    assert_eq!(store.get(&entity.key).unwrap(), Some(entity));
}

#[test]
fn test_transactional_commit_ends_transaction() {
    let store = MemoryBackend::new();
    let tx = store.begin_transaction().unwrap();
    assert_eq!(store.open_transactions(), 1);

    store.commit(Some(&tx), vec![upsert("K", "a")]).unwrap();

    assert_eq!(store.open_transactions(), 0);
    assert_eq!(store.count_kind("K"), 1);
    // A finished transaction cannot be committed again
    assert!(matches!(
        store.commit(Some(&tx), vec![]),
        Err(StoreError::InvalidArgument(_))
    ));
}

#[test]
fn test_rollback_discards_transaction() {
    let store = MemoryBackend::new();
    let tx = store.begin_transaction().unwrap();

    store.rollback(&tx).unwrap();

    assert_eq!(store.open_transactions(), 0);
    assert!(store.rollback(&tx).is_err());
}

#[test]
fn test_overlapping_transactions_conflict() {
    let store = MemoryBackend::new();
    let first = store.begin_transaction().unwrap();
    let second = store.begin_transaction().unwrap();

    store.commit(Some(&first), vec![upsert("K", "shared")]).unwrap();
    let result = store.commit(Some(&second), vec![upsert("K", "shared")]);

    assert!(matches!(result, Err(StoreError::Conflict(_))));
}

#[test]
fn test_disjoint_transactions_do_not_conflict() {
    let store = MemoryBackend::new();
    let first = store.begin_transaction().unwrap();
    let second = store.begin_transaction().unwrap();

    store.commit(Some(&first), vec![upsert("K", "a")]).unwrap();
    store.commit(Some(&second), vec![upsert("K", "b")]).unwrap();

    assert_eq!(store.count_kind("K"), 2);
}

#[test]
fn test_commit_rejects_too_many_mutations() {
    let store = MemoryBackend::new();
    let mutations = (0..=MAX_MUTATIONS_PER_COMMIT)
        .map(|i| upsert("K", &i.to_string()))
        .collect();

    let result = store.commit(None, mutations);

    assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    assert!(store.is_empty());
}

#[test]
fn test_commit_rejects_incomplete_key() {
    let store = MemoryBackend::new();
    let result = store.commit(None, vec![upsert("K", "")]);
    assert!(matches!(result, Err(StoreError::InvalidKey(_))));
}

#[test]
fn test_injected_failures_are_consumed() {
    let store = MemoryBackend::new();
    store.fail_next_commits(2);

    assert!(matches!(store.commit(None, vec![upsert("K", "a")]), Err(StoreError::Unavailable(_))));
    assert!(matches!(store.commit(None, vec![upsert("K", "a")]), Err(StoreError::Unavailable(_))));
    store.commit(None, vec![upsert("K", "a")]).unwrap();

    assert_eq!(store.len(), 1);
}

#[test]
fn test_injected_failure_still_ends_transaction() {
    let store = MemoryBackend::new();
    store.fail_next_commits(1);
    let tx = store.begin_transaction().unwrap();

    assert!(store.commit(Some(&tx), vec![upsert("K", "a")]).is_err());
    assert_eq!(store.open_transactions(), 0);
}

// =============================================================================
// Query Tests
// =============================================================================

#[test]
fn test_query_filters_by_kind() {
    let store = MemoryBackend::new();
    seed(&store, "A", 3);
    seed(&store, "B", 2);

    let batch = store.run_query(&Query::new("B"), None, None, 100).unwrap();

    assert_eq!(batch.records.len(), 2);
    assert!(batch.records.iter().all(|r| r.key.kind == "B"));
    assert!(!batch.more_results);
}

#[test]
fn test_query_pages_with_cursor() {
    let store = MemoryBackend::new();
    seed(&store, "K", 5);
    let query = Query::new("K");

    let first = store.run_query(&query, None, None, 2).unwrap();
    assert_eq!(first.records.len(), 2);
    assert!(first.more_results);

    let second = store
        .run_query(&query, None, first.end_cursor.as_ref(), 2)
        .unwrap();
    assert_eq!(second.records[0].key.name, "002");

    let third = store
        .run_query(&query, None, second.end_cursor.as_ref(), 2)
        .unwrap();
    assert_eq!(third.records.len(), 1);
    assert!(!third.more_results);
}

#[test]
fn test_query_offset_reports_skipped() {
    let store = MemoryBackend::new();
    seed(&store, "K", 3);

    let batch = store.run_query(&Query::new("K").offset(2), None, None, 10).unwrap();

    assert_eq!(batch.skipped, 2);
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].key.name, "002");
}

#[test]
fn test_keys_only_query_drops_properties() {
    let store = MemoryBackend::new();
    seed(&store, "K", 1);

    let batch = store.run_query(&Query::new("K").keys_only(), None, None, 10).unwrap();

    assert!(batch.records[0].properties.is_empty());
}

#[test]
fn test_query_in_finished_transaction_fails() {
    let store = MemoryBackend::new();
    let tx = store.begin_transaction().unwrap();
    store.rollback(&tx).unwrap();

    let result = store.run_query(&Query::new("K"), Some(&tx), None, 10);

    assert!(result.is_err());
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[test]
fn test_concurrent_non_transactional_commits() {
    let store = Arc::new(MemoryBackend::new());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..25 {
                    store.commit(None, vec![upsert("K", &format!("{}-{}", t, i))]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.count_kind("K"), 200);
    assert_eq!(store.commit_count(), 200);
}
