//! Persistent counting store for n-gram frequencies.
//!
//! Three independent SQLite tables (characters, bigrams, trigrams) accumulate
//! key -> count rows via atomic upsert-increments applied by a single
//! serialized writer, with top-N and sum queries on the read side.

use thiserror::Error;

pub mod counts;
pub mod schema;

pub use counts::{CountStore, NgramTable};

/// Errors from the counting store.
///
/// These never propagate into the capture path: increments swallow failures
/// and read queries degrade to empty results.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error (directory creation, file access)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The writer thread has shut down
    #[error("storage writer unavailable")]
    WriterGone,
}
