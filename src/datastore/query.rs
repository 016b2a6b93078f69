//! Kind queries and result batches

use serde::{Deserialize, Serialize};

use super::EntityRecord;

/// Opaque position in a result set, handed back by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(pub String);

/// A query over every entity of one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub kind: String,
    pub offset: usize,
    pub limit: Option<usize>,
    pub keys_only: bool,
}

impl Query {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            offset: 0,
            limit: None,
            keys_only: false,
        }
    }

    /// Skip the first `offset` results
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Return at most `limit` results
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Return keys with empty property maps
    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }
}

/// One page of query results
#[derive(Debug, Clone, Default)]
pub struct QueryBatch {
    pub records: Vec<EntityRecord>,

    /// Results skipped by the offset while producing this page
    pub skipped: usize,

    /// Position after the last record of the page
    pub end_cursor: Option<Cursor>,

    /// False once the result set is exhausted
    pub more_results: bool,
}
