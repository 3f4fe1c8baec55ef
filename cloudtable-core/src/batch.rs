//! Size-bounded, single-partition mutation batches
//!
//! A [`MutationBatch`] is the unit the store executes atomically. It enforces
//! two store constraints at append time:
//!
//! - at most `capacity` operations
//! - every operation targets the partition key established by the first one
//!
//! Violations are reported as [`BatchError`] with the rejected operation handed
//! back, so the owner can rotate to a fresh batch without cloning. Sealing
//! consumes the batch and yields a read-only [`SealedBatch`].

use crate::entity::Operation;
use thiserror::Error;

/// Hard per-transaction operation limit of partitioned table stores
pub const MAX_BATCH_OPERATIONS: usize = 100;

/// Why an operation could not be appended
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// The batch already holds `capacity` operations
    #[error("batch is full ({capacity} operations)")]
    Full { capacity: usize },

    /// The operation targets a different partition than the batch
    #[error("batch targets partition '{expected}', operation targets '{found}'")]
    PartitionMismatch { expected: String, found: String },
}

/// A rejected append: the reason plus the operation that was not taken
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct AppendError {
    pub reason: BatchError,
    operation: Operation,
}

impl AppendError {
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn into_parts(self) -> (BatchError, Operation) {
        (self.reason, self.operation)
    }
}

/// Result of a successful append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// 0-based position of the operation within the batch
    pub position: usize,
    /// The batch reached capacity with this append
    pub at_capacity: bool,
}

/// An open batch accepting operations for a single partition
#[derive(Debug, Clone)]
pub struct MutationBatch {
    operations: Vec<Operation>,
    partition_key: Option<String>,
    capacity: usize,
}

impl Default for MutationBatch {
    fn default() -> Self {
        Self::with_capacity(MAX_BATCH_OPERATIONS)
    }
}

impl MutationBatch {
    /// Create an empty batch bounded by [`MAX_BATCH_OPERATIONS`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty batch with a custom bound (at least 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            operations: Vec::with_capacity(capacity),
            partition_key: None,
            capacity,
        }
    }

    /// Create a batch whose first operation is `operation`
    ///
    /// Infallible because an empty batch with capacity >= 1 accepts anything.
    pub fn opened_with(capacity: usize, operation: Operation) -> Self {
        let mut batch = Self::with_capacity(capacity);
        batch.partition_key = Some(operation.partition_key().to_string());
        batch.operations.push(operation);
        batch
    }

    /// Append `operation`, preserving insertion order
    ///
    /// Operations on the same row are not collapsed; the store sees all of them.
    pub fn append(&mut self, operation: Operation) -> Result<AppendOutcome, AppendError> {
        if self.operations.len() >= self.capacity {
            return Err(AppendError {
                reason: BatchError::Full {
                    capacity: self.capacity,
                },
                operation,
            });
        }

        match &self.partition_key {
            Some(expected) if expected != operation.partition_key() => {
                return Err(AppendError {
                    reason: BatchError::PartitionMismatch {
                        expected: expected.clone(),
                        found: operation.partition_key().to_string(),
                    },
                    operation,
                });
            }
            Some(_) => {}
            None => self.partition_key = Some(operation.partition_key().to_string()),
        }

        self.operations.push(operation);
        Ok(AppendOutcome {
            position: self.operations.len() - 1,
            at_capacity: self.is_full(),
        })
    }

    /// Freeze the batch; it can no longer be appended to
    pub fn seal(self) -> SealedBatch {
        SealedBatch {
            operations: self.operations,
            partition_key: self.partition_key,
            capacity: self.capacity,
        }
    }

    /// Drop all operations and forget the partition key, keeping the allocation
    pub fn clear(&mut self) {
        self.operations.clear();
        self.partition_key = None;
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn partition_key(&self) -> Option<&str> {
        self.partition_key.as_deref()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.operations.len() >= self.capacity
    }
}

/// An immutable batch awaiting commit
#[derive(Debug, Clone, PartialEq)]
pub struct SealedBatch {
    operations: Vec<Operation>,
    partition_key: Option<String>,
    capacity: usize,
}

impl SealedBatch {
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Partition every operation targets; `None` only for an empty batch
    pub fn partition_key(&self) -> Option<&str> {
        self.partition_key.as_deref()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    /// Reopen the batch empty after it was committed, reusing its buffer
    pub fn into_cleared(self) -> MutationBatch {
        let mut batch = MutationBatch {
            operations: self.operations,
            partition_key: self.partition_key,
            capacity: self.capacity,
        };
        batch.clear();
        batch
    }
}

impl<'a> IntoIterator for &'a SealedBatch {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;

    fn upsert(pk: &str, rk: &str) -> Operation {
        Operation::upsert(Entity::new(pk, rk))
    }

    #[test]
    fn test_first_append_establishes_partition() {
        let mut batch = MutationBatch::with_capacity(3);
        assert_eq!(batch.partition_key(), None);

        let outcome = batch.append(upsert("A", "1")).unwrap();
        assert_eq!(outcome.position, 0);
        assert!(!outcome.at_capacity);
        assert_eq!(batch.partition_key(), Some("A"));
    }

    #[test]
    fn test_append_full_returns_operation() {
        let mut batch = MutationBatch::with_capacity(2);
        batch.append(upsert("A", "1")).unwrap();
        let outcome = batch.append(upsert("A", "2")).unwrap();
        assert!(outcome.at_capacity);

        let err = batch.append(upsert("A", "3")).unwrap_err();
        assert_eq!(err.reason, BatchError::Full { capacity: 2 });
        assert_eq!(err.operation().row_key(), "3");
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_append_partition_mismatch() {
        let mut batch = MutationBatch::with_capacity(100);
        batch.append(upsert("A", "1")).unwrap();

        let (reason, op) = batch.append(upsert("B", "1")).unwrap_err().into_parts();
        assert_eq!(
            reason,
            BatchError::PartitionMismatch {
                expected: "A".to_string(),
                found: "B".to_string()
            }
        );
        assert_eq!(op.partition_key(), "B");
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_duplicate_rows_are_not_collapsed() {
        let mut batch = MutationBatch::new();
        batch.append(upsert("A", "1")).unwrap();
        batch
            .append(Operation::delete(Entity::new("A", "1")))
            .unwrap();
        batch.append(upsert("A", "1")).unwrap();
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut batch = MutationBatch::with_capacity(0);
        assert_eq!(batch.capacity(), 1);
        batch.append(upsert("A", "1")).unwrap();
        assert!(batch.is_full());
    }

    #[test]
    fn test_seal_then_clear_resets_partition() {
        let mut batch = MutationBatch::with_capacity(4);
        batch.append(upsert("A", "1")).unwrap();
        batch.append(upsert("A", "2")).unwrap();

        let sealed = batch.seal();
        assert_eq!(sealed.len(), 2);
        assert_eq!(sealed.partition_key(), Some("A"));
        let rows: Vec<_> = sealed.iter().map(|op| op.row_key()).collect();
        assert_eq!(rows, vec!["1", "2"]);

        let mut reopened = sealed.into_cleared();
        assert!(reopened.is_empty());
        assert_eq!(reopened.partition_key(), None);
        assert_eq!(reopened.capacity(), 4);
        reopened.append(upsert("B", "1")).unwrap();
        assert_eq!(reopened.partition_key(), Some("B"));
    }

    #[test]
    fn test_opened_with() {
        let batch = MutationBatch::opened_with(5, upsert("Z", "9"));
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.partition_key(), Some("Z"));
        assert_eq!(batch.capacity(), 5);
    }
}
