//! Tests for the benchmarked operations
//!
//! These tests verify:
//! - The registry lists all ten operations once, in run order
//! - Write variants persist one batch of each kind atomically
//! - Wait-group variant always reports success, even when a batch fails
//! - Error-group variants surface failures
//! - Read bodies: not-found handling, offset, and the three-record cap

use std::collections::HashSet;
use std::sync::Arc;

use docstore_bench::datastore::{Client, Entity, MemoryBackend};
use docstore_bench::fixtures::{generate_batch, DummyObject, DummyObject2, DummyObject3};
use docstore_bench::operations::{
    self, create_datastore_keys, first_with_get_all, first_with_iterator, get_first_with_get_all,
    get_first_with_iterator, get_multi_with_iterator, multi_with_iterator, put_multi_with_error_group_client,
    put_multi_with_error_group_tx, put_multi_with_tx, put_multi_with_tx_client,
    put_multi_with_tx_client_bound, put_multi_with_wait_group, OperationFn, MULTI_READ_LIMIT,
};
use docstore_bench::StoreError;

// =============================================================================
// Helper Functions
// =============================================================================

fn seeded_client(batches: usize) -> Client {
    let (client, _store) = Client::in_memory();
    for _ in 0..batches {
        client.put_multi(&generate_batch::<DummyObject>()).unwrap();
    }
    client
}

const WRITE_OPERATIONS: [OperationFn; 6] = [
    put_multi_with_tx_client,
    put_multi_with_tx_client_bound,
    put_multi_with_tx,
    put_multi_with_wait_group,
    put_multi_with_error_group_tx,
    put_multi_with_error_group_client,
];

// =============================================================================
// Registry Tests
// =============================================================================

#[test]
fn test_registry_has_ten_unique_operations() {
    let all = operations::all();
    let names: HashSet<_> = all.iter().map(|op| op.name).collect();

    assert_eq!(all.len(), 10);
    assert_eq!(names.len(), 10);
    assert_eq!(all[0].name, "PutMultiWithTxClient");
    assert_eq!(all[9].name, "GetMultiWithIterator");
}

#[test]
fn test_find_is_case_insensitive() {
    assert_eq!(operations::find("getfirstwithgetall").map(|op| op.name), Some("GetFirstWithGetAll"));
    assert!(operations::find("NoSuchOperation").is_none());
}

// =============================================================================
// Write Variant Tests
// =============================================================================

#[test]
fn test_write_variants_persist_three_batches() {
    for op in WRITE_OPERATIONS {
        let (client, store) = Client::in_memory();

        op(&client).unwrap();

        assert_eq!(store.count_kind(DummyObject::KIND), 5);
        assert_eq!(store.count_kind(DummyObject2::KIND), 5);
        assert_eq!(store.count_kind(DummyObject3::KIND), 5);
        assert_eq!(store.commit_count(), 1);
        assert_eq!(store.open_transactions(), 0);
    }
}

#[test]
fn test_sequential_variants_propagate_commit_failure() {
    for op in [put_multi_with_tx_client, put_multi_with_tx_client_bound, put_multi_with_tx] {
        let (client, store) = Client::in_memory();
        store.fail_next_commits(1);

        assert!(matches!(op(&client), Err(StoreError::Unavailable(_))));
        assert!(store.is_empty());
    }
}

#[test]
fn test_wait_group_variant_always_succeeds() {
    let (client, store) = Client::in_memory();
    store.fail_next_commits(1);

    assert!(put_multi_with_wait_group(&client).is_ok());
    assert!(store.is_empty());
}

#[test]
fn test_wait_group_variant_discards_failed_batch() {
    // Room for two of the three batches
    let store = Arc::new(MemoryBackend::with_mutation_limit(10));
    let client = Client::new(store.clone());

    assert!(put_multi_with_wait_group(&client).is_ok());

    let mut per_kind = [
        store.count_kind(DummyObject::KIND),
        store.count_kind(DummyObject2::KIND),
        store.count_kind(DummyObject3::KIND),
    ];
    per_kind.sort_unstable();
    assert_eq!(per_kind, [0, 5, 5]);
}

#[test]
fn test_error_group_variants_surface_failed_batch() {
    for op in [put_multi_with_error_group_tx, put_multi_with_error_group_client] {
        let store = Arc::new(MemoryBackend::with_mutation_limit(10));
        let client = Client::new(store.clone());

        assert!(matches!(op(&client), Err(StoreError::InvalidArgument(_))));
        assert!(store.is_empty());
        assert_eq!(store.open_transactions(), 0);
    }
}

#[test]
fn test_error_group_variants_surface_failure() {
    for op in [put_multi_with_error_group_tx, put_multi_with_error_group_client] {
        let (client, store) = Client::in_memory();
        store.fail_next_commits(1);

        let result = op(&client);

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.is_empty());
    }
}

#[test]
fn test_error_group_batch_failure_rolls_back() {
    let (client, store) = Client::in_memory();

    // Fill the transaction close to the mutation limit so the parallel
    // batches overflow it
    let filler: Vec<DummyObject2> = (0..498)
        .map(|i| DummyObject2::with_id(format!("filler-{}", i)))
        .collect();
    let result = client.run_in_transaction(|tx| {
        tx.put_multi(&filler)?;
        let scoped = tx.client();
        let tasks: Vec<docstore_bench::concurrency::Task<'_>> = vec![
            Box::new(move || scoped.put_multi(&generate_batch::<DummyObject>()).map(drop)),
            Box::new(move || scoped.put_multi(&generate_batch::<DummyObject3>()).map(drop)),
        ];
        docstore_bench::concurrency::error_group(tasks)
    });

    assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    assert!(store.is_empty());
    assert_eq!(store.open_transactions(), 0);
}

#[test]
fn test_create_datastore_keys_writes_nothing() {
    let (client, store) = Client::in_memory();

    create_datastore_keys(&client).unwrap();

    assert!(store.is_empty());
    assert_eq!(store.open_transactions(), 0);
}

// =============================================================================
// Read Body Tests
// =============================================================================

#[test]
fn test_first_with_iterator_on_empty_store() {
    let client = seeded_client(0);

    let result = client.run_in_transaction(|tx| first_with_iterator(tx.client()).map(drop));

    assert!(matches!(result, Err(StoreError::NotFound)));
}

#[test]
fn test_first_with_iterator_returns_a_record() {
    let client = seeded_client(1);
    let mut found = None;

    client
        .run_in_transaction(|tx| {
            found = Some(first_with_iterator(tx.client())?);
            Ok(())
        })
        .unwrap();

    assert_eq!(found.map(|d| d.name), Some("Hoge".to_string()));
}

#[test]
fn test_first_with_get_all_on_empty_store_is_not_found() {
    let client = seeded_client(0);

    let result = client.run_in_transaction(|tx| first_with_get_all(tx.client()).map(drop));

    assert!(matches!(result, Err(StoreError::NotFound)));
}

#[test]
fn test_first_with_get_all_skips_first_record() {
    let (client, _store) = Client::in_memory();
    client
        .put_multi(&[DummyObject::with_parent("a", DummyObject2::with_id("p").key())])
        .unwrap();

    // A single record is consumed by the offset
    let result = client.run_in_transaction(|tx| first_with_get_all(tx.client()).map(drop));
    assert!(matches!(result, Err(StoreError::NotFound)));

    client
        .put_multi(&[DummyObject::with_parent("b", DummyObject2::with_id("p").key())])
        .unwrap();
    let mut found = None;
    client
        .run_in_transaction(|tx| {
            found = Some(first_with_get_all(tx.client())?);
            Ok(())
        })
        .unwrap();
    assert_eq!(found.map(|d| d.id), Some("b".to_string()));
}

#[test]
fn test_multi_with_iterator_caps_at_three() {
    let client = seeded_client(2);
    let mut read = Vec::new();

    client
        .run_in_transaction(|tx| {
            read = multi_with_iterator(tx.client())?;
            Ok(())
        })
        .unwrap();

    assert_eq!(read.len(), MULTI_READ_LIMIT);
}

#[test]
fn test_multi_with_iterator_stops_on_exhaustion() {
    let (client, _store) = Client::in_memory();
    client
        .put_multi(&generate_batch::<DummyObject>()[..2])
        .unwrap();
    let mut read = Vec::new();

    client
        .run_in_transaction(|tx| {
            read = multi_with_iterator(tx.client())?;
            Ok(())
        })
        .unwrap();

    assert_eq!(read.len(), 2);
}

#[test]
fn test_multi_with_iterator_on_empty_store_is_ok() {
    let client = seeded_client(0);

    let result = client.run_in_transaction(|tx| multi_with_iterator(tx.client()).map(drop));

    assert!(result.is_ok());
}

#[test]
fn test_read_variants_always_succeed() {
    let client = seeded_client(0);

    assert!(get_first_with_iterator(&client).is_ok());
    assert!(get_first_with_get_all(&client).is_ok());
    assert!(get_multi_with_iterator(&client).is_ok());
}
