//! Backend abstraction
//!
//! A backend is the connection to an actual store. The client layer only
//! ever talks to the store through this trait, so the same operations run
//! against the remote REST API or the in-process memory store.

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::{Cursor, EntityRecord, Query, QueryBatch};

/// Largest number of mutations one commit may carry (the Datastore limit)
pub const MAX_MUTATIONS_PER_COMMIT: usize = 500;

/// Opaque transaction handle issued by a backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

/// A single write applied at commit time
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert or overwrite
    Upsert(EntityRecord),
}

impl Mutation {
    pub fn record(&self) -> &EntityRecord {
        match self {
            Mutation::Upsert(record) => record,
        }
    }
}

/// Store connection used by [`Client`](super::Client)
///
/// Implementations must be safe to share across the threads of one
/// benchmark operation.
pub trait Backend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Most mutations one commit may carry
    fn max_mutations_per_commit(&self) -> usize {
        MAX_MUTATIONS_PER_COMMIT
    }

    /// Start a read-write transaction
    fn begin_transaction(&self) -> Result<TransactionId>;

    /// Apply `mutations` atomically. With `transaction`, the transaction is
    /// finished by this call whatever its outcome.
    fn commit(&self, transaction: Option<&TransactionId>, mutations: Vec<Mutation>) -> Result<()>;

    /// Abandon a transaction
    fn rollback(&self, transaction: &TransactionId) -> Result<()>;

    /// Fetch one page of `query`, resuming after `start` when given
    fn run_query(
        &self,
        query: &Query,
        transaction: Option<&TransactionId>,
        start: Option<&Cursor>,
        page_size: usize,
    ) -> Result<QueryBatch>;
}
