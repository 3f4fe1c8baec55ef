//! Error types for table operations

use crate::store::StoreError;
use thiserror::Error;

/// Result type for table operations
pub type Result<T> = std::result::Result<T, TableError>;

/// Errors surfaced to callers of [`TableStructure`](crate::TableStructure)
///
/// Batch capacity and partition rotation are handled internally and never
/// appear here.
#[derive(Error, Debug)]
pub enum TableError {
    /// Caller error, e.g. an empty key or an invalid structure name
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The structure was deleted through this handle and no longer accepts writes
    #[error("Structure does not exist: {0}")]
    StructureAbsent(String),

    /// A store call outside of a commit failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A batch commit failed; this batch and everything after it is still queued
    #[error("Commit of batch {position} failed ({remaining} batches still pending): {source}")]
    CommitFailed {
        /// 0-based index of the failed batch within this commit call
        position: usize,
        /// Batches left in the queue, the failed one included
        remaining: usize,
        #[source]
        source: StoreError,
    },

    /// The commit was cancelled between batch submissions
    #[error("Commit cancelled after {committed} batches ({remaining} batches still pending)")]
    Cancelled { committed: usize, remaining: usize },
}

impl TableError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn structure_absent(name: impl Into<String>) -> Self {
        Self::StructureAbsent(name.into())
    }

    /// The underlying store error, for plain store failures and failed commits
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(err) | Self::CommitFailed { source: err, .. } => Some(err),
            _ => None,
        }
    }

    /// True when retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            _ => self.store_error().is_some_and(StoreError::is_transient),
        }
    }
}
