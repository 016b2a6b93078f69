//! Transaction handle
//!
//! Writes made through a transaction are buffered and only reach the store
//! when [`Client::run_in_transaction`] commits. The handle is `Sync`, so the
//! concurrent operation variants can share one `&Transaction` across threads.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{Result, StoreError};

use super::client::{too_many_mutations, upserts};
use super::iterator::{count_records, RecordIter};
use super::{Client, Entity, Key, Mutation, Query, QueryIter, TransactionId};

/// An open read-write transaction
///
/// If dropped without being committed, the transaction is rolled back.
pub struct Transaction<'a> {
    client: &'a Client,
    id: TransactionId,
    /// Pending writes, in the order they were buffered
    mutations: Mutex<Vec<Mutation>>,
    finished: AtomicBool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn begin(client: &'a Client) -> Result<Self> {
        let id = client.backend().begin_transaction()?;
        tracing::trace!("began transaction {:?}", id);
        Ok(Self {
            client,
            id,
            mutations: Mutex::new(Vec::new()),
            finished: AtomicBool::new(false),
        })
    }

    /// Backend-issued transaction id
    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    /// True until commit or rollback
    pub fn is_active(&self) -> bool {
        !self.finished.load(Ordering::Acquire)
    }

    /// Number of buffered mutations
    pub fn pending(&self) -> usize {
        self.mutations.lock().len()
    }

    /// Key `entity` would be stored under
    pub fn key<E: Entity>(&self, entity: &E) -> Key {
        entity.key()
    }

    /// Buffer a batch of upserts; returns the keys they will be written to
    pub fn put_multi<E: Entity>(&self, entities: &[E]) -> Result<Vec<Key>> {
        self.ensure_active()?;
        let batch = upserts(entities)?;
        let keys = batch.iter().map(|m| m.record().key.clone()).collect();

        let limit = self.client.backend().max_mutations_per_commit();
        let mut mutations = self.mutations.lock();
        let total = mutations.len() + batch.len();
        if total > limit {
            return Err(too_many_mutations(total, limit));
        }
        mutations.extend(batch);
        Ok(keys)
    }

    /// Client view bound to this transaction
    pub fn client(&self) -> TxClient<'_, 'a> {
        TxClient { tx: self }
    }

    pub(crate) fn commit(self) -> Result<usize> {
        self.finish()?;
        let mutations = std::mem::take(&mut *self.mutations.lock());
        let count = mutations.len();
        self.client.backend().commit(Some(&self.id), mutations)?;
        tracing::trace!("committed transaction {:?} with {} mutations", self.id, count);
        Ok(count)
    }

    pub(crate) fn rollback(self) -> Result<()> {
        self.finish()?;
        self.client.backend().rollback(&self.id)
    }

    fn finish(&self) -> Result<()> {
        if self.finished.swap(true, Ordering::AcqRel) {
            return Err(StoreError::TransactionFinished);
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(StoreError::TransactionFinished)
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finish().is_ok() {
            if let Err(e) = self.client.backend().rollback(&self.id) {
                tracing::warn!("rollback of abandoned transaction {:?} failed: {}", self.id, e);
            }
        }
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Transaction-scoped client
///
/// Offers the client API with every read and write going through the
/// transaction it was obtained from.
#[derive(Clone, Copy)]
pub struct TxClient<'t, 'a> {
    tx: &'t Transaction<'a>,
}

impl<'t, 'a> TxClient<'t, 'a> {
    pub fn key<E: Entity>(&self, entity: &E) -> Key {
        self.tx.key(entity)
    }

    pub fn put_multi<E: Entity>(&self, entities: &[E]) -> Result<Vec<Key>> {
        self.tx.put_multi(entities)
    }

    /// Start a query over `kind`
    pub fn new_query(&self, kind: &str) -> Query {
        Query::new(kind)
    }

    /// Lazily iterate results read inside the transaction
    pub fn run<E: Entity>(&self, query: &Query) -> QueryIter<'t, E> {
        let client: &'t Client = self.tx.client;
        QueryIter::new(RecordIter::new(
            client.backend(),
            query.clone(),
            Some(self.tx.id.clone()),
            client.query_batch_size(),
        ))
    }

    pub fn count(&self, query: &Query) -> Result<usize> {
        self.tx.ensure_active()?;
        count_records(
            self.tx.client.backend(),
            query,
            Some(self.tx.id.clone()),
            self.tx.client.query_batch_size(),
        )
    }

    pub fn get_all<E: Entity>(&self, query: &Query) -> Result<Vec<E>> {
        self.run(query).collect()
    }
}
