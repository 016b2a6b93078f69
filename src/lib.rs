//! # docstore-bench
//!
//! A micro-benchmark harness for a document store's transaction,
//! batch-write and query-cursor APIs, comparing:
//! - Sequential writes inside one transaction
//! - Thread-per-batch writes joined by a wait group (errors discarded)
//! - Thread-per-batch writes joined by an error group (first error wins)
//! - Cursor iteration versus count-then-fetch-all reads
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Bootstrap (docstore-bench)                   │
//! │          CREDENTIAL_FILE_PATH → BenchConfig → Client         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Benchmark Runner                           │
//! │           (one operation at a time, timed + logged)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │              Operations (+ fixtures, fan-out)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Remote    │          │   Memory    │
//!   │ (REST/HTTP) │          │  (RwLock)   │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod credentials;

pub mod datastore;
pub mod fixtures;
pub mod concurrency;
pub mod operations;
pub mod bench;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StoreError};
pub use config::BenchConfig;
pub use datastore::Client;
pub use operations::Operation;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of docstore-bench
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
