//! Tests for query cursors
//!
//! These tests verify:
//! - Lazy iteration across several pages
//! - Offset and limit handling across pages
//! - Exhaustion reported as `None`
//! - Counting and get_all, inside and outside transactions
//! - Paging past empty pages that still move the cursor

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use docstore_bench::config::BenchConfig;
use docstore_bench::datastore::{
    Backend, Client, Cursor, Entity, EntityRecord, MemoryBackend, Mutation, Query, QueryBatch,
    TransactionId,
};
use docstore_bench::fixtures::{generate_batch, DummyObject, DummyObject2};
use docstore_bench::StoreError;

// =============================================================================
// Helper Functions
// =============================================================================

/// Client with a tiny page size so iteration crosses page boundaries
fn small_page_client() -> (Client, Arc<MemoryBackend>) {
    let store = Arc::new(MemoryBackend::new());
    let config = BenchConfig::builder().query_batch_size(2).build();
    let client = Client::with_config(store.clone(), &config).unwrap();
    (client, store)
}

fn seed_dummy_objects(client: &Client, batches: usize) {
    for _ in 0..batches {
        client.put_multi(&generate_batch::<DummyObject>()).unwrap();
    }
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_iterate_empty_kind() {
    let (client, _store) = Client::in_memory();
    let mut iter = client.run::<DummyObject>(&Query::new(DummyObject::KIND));
    assert!(iter.next().is_none());
}

#[test]
fn test_iterate_across_pages() {
    let (client, _store) = small_page_client();
    seed_dummy_objects(&client, 2);

    let all: Vec<DummyObject> = client
        .run::<DummyObject>(&Query::new(DummyObject::KIND))
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(all.len(), 10);
    assert!(all.iter().all(|d| d.name == "Hoge"));
}

#[test]
fn test_offset_and_limit_across_pages() {
    let (client, _store) = small_page_client();
    seed_dummy_objects(&client, 2);

    let query = Query::new(DummyObject::KIND).offset(3).limit(5);
    let page: Vec<DummyObject> = client.get_all(&query).unwrap();

    let everything: Vec<DummyObject> = client.get_all(&Query::new(DummyObject::KIND)).unwrap();
    assert_eq!(page, everything[3..8].to_vec());
}

#[test]
fn test_offset_past_end_yields_nothing() {
    let (client, _store) = small_page_client();
    seed_dummy_objects(&client, 1);

    let query = Query::new(DummyObject::KIND).offset(10);

    assert_eq!(client.count(&query).unwrap(), 0);
    assert!(client.get_all::<DummyObject>(&query).unwrap().is_empty());
}

#[test]
fn test_zero_limit_yields_nothing() {
    let (client, _store) = Client::in_memory();
    seed_dummy_objects(&client, 1);

    let query = Query::new(DummyObject::KIND).limit(0);

    assert!(client.run::<DummyObject>(&query).next().is_none());
}

#[test]
fn test_take_stops_early() {
    let (client, _store) = small_page_client();
    seed_dummy_objects(&client, 2);

    let first_three: Vec<_> = client
        .run::<DummyObject>(&Query::new(DummyObject::KIND))
        .take(3)
        .collect();

    assert_eq!(first_three.len(), 3);
}

#[test]
fn test_decoding_wrong_kind_is_an_item_error() {
    let (client, _store) = Client::in_memory();
    client.put_multi(&generate_batch::<DummyObject2>()).unwrap();

    let mut iter = client.run::<DummyObject>(&Query::new(DummyObject2::KIND));

    assert!(matches!(iter.next(), Some(Err(StoreError::InvalidArgument(_)))));
}

// =============================================================================
// Count Tests
// =============================================================================

#[test]
fn test_count_respects_offset() {
    let (client, _store) = small_page_client();
    seed_dummy_objects(&client, 1);

    assert_eq!(client.count(&Query::new(DummyObject::KIND)).unwrap(), 5);
    assert_eq!(client.count(&Query::new(DummyObject::KIND).offset(1)).unwrap(), 4);
}

#[test]
fn test_count_inside_transaction() {
    let (client, _store) = Client::in_memory();
    seed_dummy_objects(&client, 1);

    let mut counted = 0;
    client
        .run_in_transaction(|tx| {
            counted = tx.client().count(&Query::new(DummyObject::KIND))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(counted, 5);
}

#[test]
fn test_parent_property_survives_storage() {
    let (client, _store) = Client::in_memory();
    let parent = client.key(&DummyObject2::with_id("p"));
    let child = DummyObject::with_parent("c", parent.clone());

    client.put_multi(&[child]).unwrap();

    let loaded: Vec<DummyObject> = client.get_all(&Query::new(DummyObject::KIND)).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, "c");
    assert_eq!(loaded[0].parent, Some(parent));
}

// =============================================================================
// Paging Tests
// =============================================================================

/// Backend that answers queries from a fixed list of pages
struct ScriptedPages {
    pages: Mutex<VecDeque<QueryBatch>>,
    calls: AtomicUsize,
}

impl ScriptedPages {
    fn new(pages: Vec<QueryBatch>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

impl Backend for ScriptedPages {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn begin_transaction(&self) -> docstore_bench::Result<TransactionId> {
        Ok(TransactionId("scripted".to_string()))
    }

    fn commit(&self, _: Option<&TransactionId>, _: Vec<Mutation>) -> docstore_bench::Result<()> {
        Ok(())
    }

    fn rollback(&self, _: &TransactionId) -> docstore_bench::Result<()> {
        Ok(())
    }

    fn run_query(
        &self,
        _query: &Query,
        _transaction: Option<&TransactionId>,
        _start: Option<&Cursor>,
        _page_size: usize,
    ) -> docstore_bench::Result<QueryBatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.lock().pop_front().unwrap_or_default())
    }
}

fn page(records: Vec<EntityRecord>, end_cursor: &str, more_results: bool) -> QueryBatch {
    QueryBatch {
        records,
        skipped: 0,
        end_cursor: Some(Cursor(end_cursor.to_string())),
        more_results,
    }
}

fn one_dummy_record() -> Vec<EntityRecord> {
    vec![generate_batch::<DummyObject>().remove(0).to_record()]
}

#[test]
fn test_empty_page_with_moved_cursor_keeps_reading() {
    let backend = ScriptedPages::new(vec![
        page(Vec::new(), "c1", true),
        page(one_dummy_record(), "c2", false),
    ]);
    let client = Client::new(backend.clone());

    let all: Vec<DummyObject> = client.get_all(&Query::new(DummyObject::KIND)).unwrap();

    assert_eq!(all.len(), 1);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_count_reads_past_empty_pages() {
    let backend = ScriptedPages::new(vec![
        page(Vec::new(), "c1", true),
        page(Vec::new(), "c2", true),
        page(one_dummy_record(), "c3", false),
    ]);
    let client = Client::new(backend);

    assert_eq!(client.count(&Query::new(DummyObject::KIND)).unwrap(), 1);
}

#[test]
fn test_stalled_cursor_ends_iteration() {
    let backend = ScriptedPages::new(vec![
        page(Vec::new(), "c1", true),
        page(Vec::new(), "c1", true),
        page(one_dummy_record(), "c2", false),
    ]);
    let client = Client::new(backend.clone());

    let all: Vec<DummyObject> = client.get_all(&Query::new(DummyObject::KIND)).unwrap();

    assert!(all.is_empty());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
}
