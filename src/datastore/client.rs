//! Client handle
//!
//! The handle the benchmark operations receive. Cheap to clone; every clone
//! shares the same backend connection.

use std::sync::Arc;

use crate::config::BenchConfig;
use crate::error::{Result, StoreError};

use super::iterator::{count_records, RecordIter};
use super::memory::MemoryBackend;
use super::remote::RemoteBackend;
use super::transaction::Transaction;
use super::{Backend, Entity, Key, Mutation, Query, QueryIter};

/// Outcome of a committed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commit {
    /// Attempts used, including the successful one
    pub attempts: usize,

    /// Mutations applied by the commit
    pub mutations: usize,
}

/// Document-store client
#[derive(Clone)]
pub struct Client {
    backend: Arc<dyn Backend>,
    max_transaction_attempts: usize,
    query_batch_size: usize,
}

impl Client {
    /// Wrap a backend with default client settings
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let defaults = BenchConfig::default();
        Self {
            backend,
            max_transaction_attempts: defaults.max_transaction_attempts,
            query_batch_size: defaults.query_batch_size,
        }
    }

    /// Wrap a backend, taking client settings from `config`
    pub fn with_config(backend: Arc<dyn Backend>, config: &BenchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            max_transaction_attempts: config.max_transaction_attempts,
            query_batch_size: config.query_batch_size,
        })
    }

    /// Connect to the remote store described by `config`
    pub fn connect(config: &BenchConfig) -> Result<Self> {
        let backend = RemoteBackend::connect(config)?;
        Self::with_config(Arc::new(backend), config)
    }

    /// Client over a fresh in-process store
    pub fn in_memory() -> (Self, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (Self::new(backend.clone()), backend)
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub(crate) fn query_batch_size(&self) -> usize {
        self.query_batch_size
    }

    /// Key `entity` would be stored under
    pub fn key<E: Entity>(&self, entity: &E) -> Key {
        entity.key()
    }

    /// Write a batch outside any transaction
    pub fn put_multi<E: Entity>(&self, entities: &[E]) -> Result<Vec<Key>> {
        let mutations = upserts(entities)?;
        let limit = self.backend.max_mutations_per_commit();
        if mutations.len() > limit {
            return Err(too_many_mutations(mutations.len(), limit));
        }
        let keys = mutations.iter().map(|m| m.record().key.clone()).collect();
        self.backend.commit(None, mutations)?;
        Ok(keys)
    }

    /// Lazily iterate the results of `query`
    pub fn run<E: Entity>(&self, query: &Query) -> QueryIter<'_, E> {
        QueryIter::new(RecordIter::new(
            self.backend(),
            query.clone(),
            None,
            self.query_batch_size,
        ))
    }

    /// Number of results `query` matches (after its offset)
    pub fn count(&self, query: &Query) -> Result<usize> {
        count_records(self.backend(), query, None, self.query_batch_size)
    }

    /// Collect every result of `query`
    pub fn get_all<E: Entity>(&self, query: &Query) -> Result<Vec<E>> {
        self.run(query).collect()
    }

    /// Run `body` inside a transaction
    ///
    /// Mutations buffered by `body` are committed atomically when it returns
    /// `Ok`; the transaction is rolled back when it returns `Err`. A commit
    /// rejected with `Conflict` re-runs `body` in a new transaction, up to the
    /// configured attempt limit.
    pub fn run_in_transaction<F>(&self, mut body: F) -> Result<Commit>
    where
        F: FnMut(&Transaction<'_>) -> Result<()>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let tx = Transaction::begin(self)?;

            if let Err(e) = body(&tx) {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!("rollback after failed body also failed: {}", rollback_err);
                }
                return Err(e);
            }

            match tx.commit() {
                Ok(mutations) => {
                    return Ok(Commit {
                        attempts: attempt,
                        mutations,
                    })
                }
                Err(e) if e.is_conflict() && attempt < self.max_transaction_attempts => {
                    tracing::debug!("transaction attempt {} conflicted, retrying: {}", attempt, e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("backend", &self.backend.name())
            .field("max_transaction_attempts", &self.max_transaction_attempts)
            .field("query_batch_size", &self.query_batch_size)
            .finish()
    }
}

/// Upsert mutations for a batch, rejecting incomplete keys
pub(crate) fn upserts<E: Entity>(entities: &[E]) -> Result<Vec<Mutation>> {
    entities
        .iter()
        .map(|entity| {
            let record = entity.to_record();
            record.key.ensure_complete()?;
            Ok(Mutation::Upsert(record))
        })
        .collect()
}

pub(crate) fn too_many_mutations(count: usize, limit: usize) -> StoreError {
    StoreError::InvalidArgument(format!(
        "{} mutations exceed the per-commit limit of {}",
        count, limit
    ))
}
