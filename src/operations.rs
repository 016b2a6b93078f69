//! Benchmarked operations
//!
//! Every variant does the same conceptual work with a different transaction
//! or concurrency idiom: write one batch of each fixture kind, or read a few
//! `DummyObject`s back. The runner times them in the order of [`all`].
//!
//! Some variants deliberately ignore the outcome of their transaction and
//! always report success; those outcomes are logged at DEBUG.

use crate::concurrency::{error_group, wait_group, Task};
use crate::datastore::{Client, Entity, TxClient};
use crate::error::{Result, StoreError};
use crate::fixtures::{generate_batch, new_id, DummyObject, DummyObject2, DummyObject3};

/// Signature shared by every operation
pub type OperationFn = fn(&Client) -> Result<()>;

/// An operation and the label it is reported under
#[derive(Clone, Copy)]
pub struct Operation {
    pub name: &'static str,
    pub run: OperationFn,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Operation").field(&self.name).finish()
    }
}

/// Parent/child key pairs built by `create_datastore_keys`
pub const KEY_PAIRS: usize = 100;

/// Most records `get_multi_with_iterator` reads
pub const MULTI_READ_LIMIT: usize = 3;

/// Every operation, in run order
pub fn all() -> Vec<Operation> {
    vec![
        Operation { name: "PutMultiWithTxClient", run: put_multi_with_tx_client },
        Operation { name: "PutMultiWithTxClientBound", run: put_multi_with_tx_client_bound },
        Operation { name: "PutMultiWithTx", run: put_multi_with_tx },
        Operation { name: "PutMultiWithWaitGroup", run: put_multi_with_wait_group },
        Operation { name: "PutMultiWithErrorGroupTx", run: put_multi_with_error_group_tx },
        Operation { name: "PutMultiWithErrorGroupClient", run: put_multi_with_error_group_client },
        Operation { name: "CreateDatastoreKeys", run: create_datastore_keys },
        Operation { name: "GetFirstWithIterator", run: get_first_with_iterator },
        Operation { name: "GetFirstWithGetAll", run: get_first_with_get_all },
        Operation { name: "GetMultiWithIterator", run: get_multi_with_iterator },
    ]
}

/// Look an operation up by label (case-insensitive)
pub fn find(name: &str) -> Option<Operation> {
    all().into_iter().find(|op| op.name.eq_ignore_ascii_case(name))
}

// =============================================================================
// Sequential writes
// =============================================================================

/// Three sequential batch writes, re-obtaining the transaction client each time
pub fn put_multi_with_tx_client(client: &Client) -> Result<()> {
    client.run_in_transaction(|tx| {
        tx.client().put_multi(&generate_batch::<DummyObject>())?;
        tx.client().put_multi(&generate_batch::<DummyObject2>())?;
        tx.client().put_multi(&generate_batch::<DummyObject3>())?;
        Ok(())
    })?;
    Ok(())
}

/// Three sequential batch writes through one bound transaction client
pub fn put_multi_with_tx_client_bound(client: &Client) -> Result<()> {
    client.run_in_transaction(|tx| {
        let scoped = tx.client();
        scoped.put_multi(&generate_batch::<DummyObject>())?;
        scoped.put_multi(&generate_batch::<DummyObject2>())?;
        scoped.put_multi(&generate_batch::<DummyObject3>())?;
        Ok(())
    })?;
    Ok(())
}

/// Three sequential batch writes directly on the transaction handle
pub fn put_multi_with_tx(client: &Client) -> Result<()> {
    client.run_in_transaction(|tx| {
        tx.put_multi(&generate_batch::<DummyObject>())?;
        tx.put_multi(&generate_batch::<DummyObject2>())?;
        tx.put_multi(&generate_batch::<DummyObject3>())?;
        Ok(())
    })?;
    Ok(())
}

// =============================================================================
// Concurrent writes
// =============================================================================

/// One thread per batch, joined without looking at errors. Always succeeds.
pub fn put_multi_with_wait_group(client: &Client) -> Result<()> {
    let outcome = client.run_in_transaction(|tx| {
        let tasks: Vec<Task<'_>> = vec![
            Box::new(move || tx.put_multi(&generate_batch::<DummyObject>()).map(drop)),
            Box::new(move || tx.put_multi(&generate_batch::<DummyObject2>()).map(drop)),
            Box::new(move || tx.put_multi(&generate_batch::<DummyObject3>()).map(drop)),
        ];
        wait_group(tasks);
        Ok(())
    });
    log_discarded("PutMultiWithWaitGroup", outcome);
    Ok(())
}

/// One thread per batch on the transaction handle; the first error aborts
pub fn put_multi_with_error_group_tx(client: &Client) -> Result<()> {
    client.run_in_transaction(|tx| {
        let tasks: Vec<Task<'_>> = vec![
            Box::new(move || tx.put_multi(&generate_batch::<DummyObject>()).map(drop)),
            Box::new(move || tx.put_multi(&generate_batch::<DummyObject2>()).map(drop)),
            Box::new(move || tx.put_multi(&generate_batch::<DummyObject3>()).map(drop)),
        ];
        error_group(tasks)
    })?;
    Ok(())
}

/// One thread per batch through the transaction client; the first error aborts
pub fn put_multi_with_error_group_client(client: &Client) -> Result<()> {
    client.run_in_transaction(|tx| {
        let scoped = tx.client();
        let tasks: Vec<Task<'_>> = vec![
            Box::new(move || scoped.put_multi(&generate_batch::<DummyObject>()).map(drop)),
            Box::new(move || scoped.put_multi(&generate_batch::<DummyObject2>()).map(drop)),
            Box::new(move || scoped.put_multi(&generate_batch::<DummyObject3>()).map(drop)),
        ];
        error_group(tasks)
    })?;
    Ok(())
}

// =============================================================================
// Keys
// =============================================================================

/// Build `KEY_PAIRS` parent keys and child records referencing them,
/// without writing anything. Always succeeds.
pub fn create_datastore_keys(client: &Client) -> Result<()> {
    let outcome = client.run_in_transaction(|tx| {
        for _ in 0..KEY_PAIRS {
            let parent = tx.key(&DummyObject2::with_id(new_id()));
            let _child = tx.key(&DummyObject::with_parent(new_id(), parent));
        }
        Ok(())
    });
    log_discarded("CreateDatastoreKeys", outcome);
    Ok(())
}

// =============================================================================
// Reads
// =============================================================================

/// First `DummyObject` from a cursor; `NotFound` when there is none
pub fn first_with_iterator(scoped: TxClient<'_, '_>) -> Result<DummyObject> {
    let query = scoped.new_query(DummyObject::KIND);
    let mut iter = scoped.run::<DummyObject>(&query);
    match iter.next() {
        Some(result) => result,
        None => Err(StoreError::NotFound),
    }
}

/// Count past an offset of 1, then fetch everything and take the first
pub fn first_with_get_all(scoped: TxClient<'_, '_>) -> Result<DummyObject> {
    let query = scoped.new_query(DummyObject::KIND).offset(1);
    if scoped.count(&query)? == 0 {
        return Err(StoreError::NotFound);
    }
    // The count can be stale by the time the fetch runs
    scoped
        .get_all::<DummyObject>(&query)?
        .into_iter()
        .next()
        .ok_or(StoreError::NotFound)
}

/// Up to `MULTI_READ_LIMIT` records, stopping early when the cursor runs out
pub fn multi_with_iterator(scoped: TxClient<'_, '_>) -> Result<Vec<DummyObject>> {
    let query = scoped.new_query(DummyObject::KIND);
    scoped
        .run::<DummyObject>(&query)
        .take(MULTI_READ_LIMIT)
        .collect()
}

/// Always succeeds; the record found (if any) is logged
pub fn get_first_with_iterator(client: &Client) -> Result<()> {
    let mut found = None;
    let outcome = client.run_in_transaction(|tx| {
        found = Some(first_with_iterator(tx.client())?);
        Ok(())
    });
    log_discarded("GetFirstWithIterator", outcome);
    tracing::info!("first DummyObject: {:?}", found);
    Ok(())
}

/// Always succeeds
pub fn get_first_with_get_all(client: &Client) -> Result<()> {
    let outcome = client.run_in_transaction(|tx| {
        let first = first_with_get_all(tx.client())?;
        tracing::trace!("GetFirstWithGetAll read {}", first.id);
        Ok(())
    });
    log_discarded("GetFirstWithGetAll", outcome);
    Ok(())
}

/// Always succeeds
pub fn get_multi_with_iterator(client: &Client) -> Result<()> {
    let outcome = client.run_in_transaction(|tx| {
        let records = multi_with_iterator(tx.client())?;
        tracing::trace!("GetMultiWithIterator read {} records", records.len());
        Ok(())
    });
    log_discarded("GetMultiWithIterator", outcome);
    Ok(())
}

fn log_discarded<T>(name: &str, outcome: Result<T>) {
    if let Err(e) = outcome {
        tracing::debug!("{} ignored transaction error: {}", name, e);
    }
}
