//! Query cursors
//!
//! Results are pulled from the backend one page at a time. Exhaustion is
//! reported as `None`, never as an error.

use std::collections::VecDeque;
use std::marker::PhantomData;

use crate::error::Result;

use super::entity::expect_kind;
use super::{Backend, Cursor, Entity, EntityRecord, Query, TransactionId};

/// Untyped paging cursor shared by typed iteration and counting
pub(crate) struct RecordIter<'a> {
    backend: &'a dyn Backend,
    /// Remaining offset and limit; both shrink as pages arrive
    query: Query,
    transaction: Option<TransactionId>,
    cursor: Option<Cursor>,
    buffer: VecDeque<EntityRecord>,
    page_size: usize,
    done: bool,
}

impl<'a> RecordIter<'a> {
    pub(crate) fn new(
        backend: &'a dyn Backend,
        query: Query,
        transaction: Option<TransactionId>,
        page_size: usize,
    ) -> Self {
        let done = query.limit == Some(0);
        Self {
            backend,
            query,
            transaction,
            cursor: None,
            buffer: VecDeque::new(),
            page_size: page_size.max(1),
            done,
        }
    }

    fn fetch_page(&mut self) -> Result<()> {
        let batch = self.backend.run_query(
            &self.query,
            self.transaction.as_ref(),
            self.cursor.as_ref(),
            self.page_size,
        )?;

        tracing::trace!(
            "query page for {}: {} records, {} skipped, more={}",
            self.query.kind,
            batch.records.len(),
            batch.skipped,
            batch.more_results
        );

        // An empty page can still move the cursor (the store hit a deadline)
        let cursor_moved = batch.end_cursor.is_some() && batch.end_cursor != self.cursor;
        let progressed = !batch.records.is_empty() || batch.skipped > 0 || cursor_moved;

        self.query.offset = self.query.offset.saturating_sub(batch.skipped);
        if let Some(limit) = self.query.limit {
            self.query.limit = Some(limit.saturating_sub(batch.records.len()));
        }
        if batch.end_cursor.is_some() {
            self.cursor = batch.end_cursor;
        }

        // A page that made no progress cannot advance
        self.done = !batch.more_results || !progressed || self.query.limit == Some(0);
        self.buffer.extend(batch.records);
        Ok(())
    }
}

impl Iterator for RecordIter<'_> {
    type Item = Result<EntityRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

/// Typed cursor over query results
///
/// Each item is decoded as it is yielded; a decode failure is returned as
/// that item's error and iteration may continue.
pub struct QueryIter<'a, E> {
    inner: RecordIter<'a>,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: Entity> QueryIter<'a, E> {
    pub(crate) fn new(inner: RecordIter<'a>) -> Self {
        Self {
            inner,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Iterator for QueryIter<'_, E> {
    type Item = Result<E>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.inner.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e)),
        };
        Some(expect_kind::<E>(&record).and_then(|_| E::from_record(record)))
    }
}

/// Count everything a query matches, using keys-only pages
pub(crate) fn count_records(
    backend: &dyn Backend,
    query: &Query,
    transaction: Option<TransactionId>,
    page_size: usize,
) -> Result<usize> {
    let mut count = 0;
    for record in RecordIter::new(backend, query.clone().keys_only(), transaction, page_size) {
        record?;
        count += 1;
    }
    Ok(count)
}
