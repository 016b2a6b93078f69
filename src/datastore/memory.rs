//! In-process backend
//!
//! A BTreeMap of bincode-encoded entities behind a RwLock, with optimistic
//! transactions: a transactional commit fails with `Conflict` if any key it
//! writes was committed by someone else after the transaction began.
//!
//! Reads always see the latest committed state.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::error::{Result, StoreError};

use super::{
    Backend, Cursor, EntityRecord, Key, Mutation, Properties, Query, QueryBatch, TransactionId,
    MAX_MUTATIONS_PER_COMMIT,
};

/// A stored entity and the commit that last wrote it
struct StoredEntity {
    version: u64,
    /// bincode-encoded `Properties`
    bytes: Vec<u8>,
}

/// Thread-safe in-memory document store
///
/// ## Concurrency:
/// - `entities`: RwLock; commits validate and apply under the write lock
/// - `transactions`: open transactions and the version they started at
/// - counters are atomics
pub struct MemoryBackend {
    entities: RwLock<BTreeMap<Key, StoredEntity>>,
    transactions: Mutex<HashMap<TransactionId, u64>>,
    /// Version of the last successful commit
    version: AtomicU64,
    next_transaction: AtomicU64,
    /// Commits left to fail with `Unavailable`
    failing_commits: AtomicUsize,
    commits: AtomicU64,
    mutation_limit: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(BTreeMap::new()),
            transactions: Mutex::new(HashMap::new()),
            version: AtomicU64::new(0),
            next_transaction: AtomicU64::new(1),
            failing_commits: AtomicUsize::new(0),
            commits: AtomicU64::new(0),
            mutation_limit: MAX_MUTATIONS_PER_COMMIT,
        }
    }

    /// Store that accepts at most `limit` mutations per commit
    pub fn with_mutation_limit(limit: usize) -> Self {
        Self {
            mutation_limit: limit,
            ..Self::new()
        }
    }

    /// Make the next `count` commits fail with `Unavailable`
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Load one entity
    pub fn get(&self, key: &Key) -> Result<Option<EntityRecord>> {
        let entities = self.entities.read();
        match entities.get(key) {
            Some(stored) => Ok(Some(EntityRecord::new(key.clone(), decode(&stored.bytes)?))),
            None => Ok(None),
        }
    }

    /// Total number of stored entities
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored entities of `kind`
    pub fn count_kind(&self, kind: &str) -> usize {
        self.entities.read().keys().filter(|k| k.kind == kind).count()
    }

    /// Successful commits so far
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Transactions begun but not yet committed or rolled back
    pub fn open_transactions(&self) -> usize {
        self.transactions.lock().len()
    }

    /// Consume one injected failure, if any are pending
    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn ensure_open(&self, transaction: &TransactionId) -> Result<()> {
        if self.transactions.lock().contains_key(transaction) {
            Ok(())
        } else {
            Err(unknown_transaction(transaction))
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn max_mutations_per_commit(&self) -> usize {
        self.mutation_limit
    }

    fn begin_transaction(&self) -> Result<TransactionId> {
        let id = TransactionId(format!(
            "mem-tx-{}",
            self.next_transaction.fetch_add(1, Ordering::Relaxed)
        ));
        let start = self.version.load(Ordering::SeqCst);
        self.transactions.lock().insert(id.clone(), start);
        Ok(id)
    }

    fn commit(&self, transaction: Option<&TransactionId>, mutations: Vec<Mutation>) -> Result<()> {
        // The transaction ends here whatever happens next
        let started_at = match transaction {
            Some(id) => Some(
                self.transactions
                    .lock()
                    .remove(id)
                    .ok_or_else(|| unknown_transaction(id))?,
            ),
            None => None,
        };

        if self.take_injected_failure() {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }
        if mutations.len() > self.mutation_limit {
            return Err(StoreError::InvalidArgument(format!(
                "{} mutations exceed the per-commit limit of {}",
                mutations.len(),
                self.mutation_limit
            )));
        }

        // Encode before taking the write lock
        let mut encoded = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            let Mutation::Upsert(record) = mutation;
            record.key.ensure_complete()?;
            let bytes = bincode::serialize(&record.properties)?;
            encoded.push((record.key, bytes));
        }

        let mut entities = self.entities.write();

        if let Some(start) = started_at {
            for (key, _) in &encoded {
                if let Some(stored) = entities.get(key) {
                    if stored.version > start {
                        return Err(StoreError::Conflict(format!(
                            "{} was modified by a concurrent commit",
                            key
                        )));
                    }
                }
            }
        }

        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        for (key, bytes) in encoded {
            entities.insert(key, StoredEntity { version, bytes });
        }
        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn rollback(&self, transaction: &TransactionId) -> Result<()> {
        self.transactions
            .lock()
            .remove(transaction)
            .map(|_| ())
            .ok_or_else(|| unknown_transaction(transaction))
    }

    fn run_query(
        &self,
        query: &Query,
        transaction: Option<&TransactionId>,
        start: Option<&Cursor>,
        page_size: usize,
    ) -> Result<QueryBatch> {
        if let Some(id) = transaction {
            self.ensure_open(id)?;
        }
        let after = start.map(decode_cursor).transpose()?;
        let page_limit = query.limit.map_or(page_size, |l| l.min(page_size));

        let entities = self.entities.read();
        let mut matching = entities
            .iter()
            .filter(|(key, _)| key.kind == query.kind)
            .filter(|(key, _)| after.as_ref().map_or(true, |a| *key > a))
            .peekable();

        let mut batch = QueryBatch::default();
        let mut last_seen: Option<&Key> = None;

        while batch.skipped < query.offset {
            match matching.next() {
                Some((key, _)) => {
                    batch.skipped += 1;
                    last_seen = Some(key);
                }
                None => break,
            }
        }

        while batch.records.len() < page_limit {
            let Some((key, stored)) = matching.next() else {
                break;
            };
            let properties = if query.keys_only {
                Properties::new()
            } else {
                decode(&stored.bytes)?
            };
            batch.records.push(EntityRecord::new(key.clone(), properties));
            last_seen = Some(key);
        }

        batch.more_results = matching.peek().is_some();
        batch.end_cursor = last_seen.map(encode_cursor).transpose()?;
        Ok(batch)
    }
}

fn decode(bytes: &[u8]) -> Result<Properties> {
    Ok(bincode::deserialize(bytes)?)
}

fn encode_cursor(key: &Key) -> Result<Cursor> {
    Ok(Cursor(serde_json::to_string(key)?))
}

fn decode_cursor(cursor: &Cursor) -> Result<Key> {
    serde_json::from_str(&cursor.0)
        .map_err(|e| StoreError::InvalidArgument(format!("bad cursor: {}", e)))
}

fn unknown_transaction(id: &TransactionId) -> StoreError {
    StoreError::InvalidArgument(format!("unknown or finished transaction {}", id.0))
}
