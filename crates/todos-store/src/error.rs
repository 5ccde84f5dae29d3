//! Store error types.

use thiserror::Error;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by [`TodoStore`](crate::TodoStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No todo exists with the requested id.
    #[error("todo not found: {0}")]
    NotFound(i64),

    /// SQLite reported an error.
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database was written by a newer schema than this binary knows.
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        /// Version recorded in the database file.
        db_version: u32,
        /// Latest version known to this binary.
        latest_supported: u32,
    },

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// The blocking task running the query failed.
    #[error("store task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Returns `true` if this error means the requested row does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
