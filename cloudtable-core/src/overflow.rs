//! FIFO queue of sealed batches awaiting commit

use crate::batch::SealedBatch;
use std::collections::VecDeque;

/// Sealed batches in the order they were rotated out of the active slot
///
/// This is an ordering device only. A batch stays at the head until its
/// commit succeeds; nothing here retries or reorders.
#[derive(Debug, Default, Clone)]
pub struct BatchOverflowQueue {
    batches: VecDeque<SealedBatch>,
}

impl BatchOverflowQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sealed batch to the tail
    pub fn enqueue(&mut self, batch: SealedBatch) {
        self.batches.push_back(batch);
    }

    /// Remove and return the head
    pub fn dequeue(&mut self) -> Option<SealedBatch> {
        self.batches.pop_front()
    }

    /// The head, without removing it
    pub fn front(&self) -> Option<&SealedBatch> {
        self.batches.front()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Total operations across all queued batches
    pub fn operation_count(&self) -> usize {
        self.batches.iter().map(SealedBatch::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SealedBatch> {
        self.batches.iter()
    }

    /// Drop every queued batch, returning how many were discarded
    pub fn clear(&mut self) -> usize {
        let discarded = self.batches.len();
        self.batches.clear();
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::MutationBatch;
    use crate::entity::{Entity, Operation};

    fn sealed(pk: &str, rows: &[&str]) -> SealedBatch {
        let mut batch = MutationBatch::new();
        for rk in rows {
            batch.append(Operation::upsert(Entity::new(pk, *rk))).unwrap();
        }
        batch.seal()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = BatchOverflowQueue::new();
        assert!(queue.is_empty());

        queue.enqueue(sealed("A", &["1", "2"]));
        queue.enqueue(sealed("B", &["1"]));
        queue.enqueue(sealed("C", &["1", "2", "3"]));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.operation_count(), 6);

        assert_eq!(queue.front().unwrap().partition_key(), Some("A"));
        assert_eq!(queue.dequeue().unwrap().partition_key(), Some("A"));
        assert_eq!(queue.dequeue().unwrap().partition_key(), Some("B"));
        assert_eq!(queue.dequeue().unwrap().partition_key(), Some("C"));
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_clear_reports_discarded() {
        let mut queue = BatchOverflowQueue::new();
        queue.enqueue(sealed("A", &["1"]));
        queue.enqueue(sealed("A", &["2"]));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }
}
