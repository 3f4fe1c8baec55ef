//! The backing store seam
//!
//! [`StoreClient`] is everything [`TableStructure`](crate::TableStructure)
//! needs from a partitioned table service. Implementations own transport,
//! credentials and retry policy; this crate performs no retries of its own.

use crate::batch::{SealedBatch, MAX_BATCH_OPERATIONS};
use crate::entity::Entity;
use crate::query::{ContinuationToken, Page, PartitionQuery};
use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

/// Errors reported by a store
///
/// - `Unavailable` is transient; the caller may retry
/// - `Rejected` means the store refused the request as written (version tag
///   mismatch, missing row, malformed batch); retrying unchanged will fail again
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Network, timeout or throttling failure
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Credentials missing, invalid or insufficient
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The store refused the request
    #[error("Store rejected request: {0}")]
    Rejected(String),

    /// The structure itself does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result type for store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A partitioned, keyed table service
///
/// One client may serve many structures; every call names the structure.
/// Clients are shared read-only after construction.
#[async_trait]
pub trait StoreClient: Debug + Send + Sync {
    /// Hard limit on operations per atomic batch
    fn max_batch_operations(&self) -> usize {
        MAX_BATCH_OPERATIONS
    }

    async fn exists(&self, structure: &str) -> StoreResult<bool>;

    /// Ensure the structure exists
    ///
    /// Returns `true` when it exists after the call, whether it was created now
    /// or was already there, and `false` when creation was attempted but the
    /// store did not confirm it.
    async fn create_if_missing(&self, structure: &str) -> StoreResult<bool>;

    /// Returns `true` if a structure was deleted
    async fn delete_if_exists(&self, structure: &str) -> StoreResult<bool>;

    /// Execute every operation of `batch` as one all-or-nothing transaction
    ///
    /// All operations share one partition key and there are at most
    /// [`max_batch_operations`](Self::max_batch_operations) of them.
    async fn commit_batch(&self, structure: &str, batch: &SealedBatch) -> StoreResult<()>;

    /// Fetch one page of a partition scan, resuming after `continuation`
    async fn fetch_page(
        &self,
        structure: &str,
        query: &PartitionQuery,
        continuation: Option<&ContinuationToken>,
    ) -> StoreResult<Page>;

    /// Point lookup; `Ok(None)` when no such row exists
    async fn get_by_key(
        &self,
        structure: &str,
        partition_key: &str,
        row_key: &str,
    ) -> StoreResult<Option<Entity>>;
}
