//! Document-Store Client Module
//!
//! The client layer the benchmark operations drive.
//!
//! ## Responsibilities
//! - Named keys, typed entities and their untyped records
//! - Kind queries with offset/limit, paged through lazy cursors
//! - Read-write transactions with buffered mutations, committed atomically
//! - `run_in_transaction` with retry on commit conflicts
//!
//! ## Layering
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Client / Transaction / TxClient / QueryIter  │
//! └──────────────────────┬───────────────────────┘
//!                        │ Backend trait
//!          ┌─────────────┴─────────────┐
//!          ▼                           ▼
//!   ┌─────────────┐             ┌─────────────┐
//!   │   Remote    │             │   Memory    │
//!   │ (REST/HTTP) │             │  (RwLock)   │
//!   └─────────────┘             └─────────────┘
//! ```

mod backend;
mod client;
mod entity;
mod iterator;
mod key;
mod memory;
mod query;
mod remote;
mod transaction;
mod value;

pub use backend::{Backend, Mutation, TransactionId, MAX_MUTATIONS_PER_COMMIT};
pub use client::{Client, Commit};
pub use entity::{Entity, EntityRecord};
pub use iterator::QueryIter;
pub use key::Key;
pub use memory::MemoryBackend;
pub use query::{Cursor, Query, QueryBatch};
pub use remote::RemoteBackend;
pub use transaction::{Transaction, TxClient};
pub use value::{Properties, Value};
