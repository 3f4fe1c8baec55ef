//! In-memory store implementation for testing
//!
//! Keeps every structure in a `BTreeMap` ordered by `(partition_key, row_key)`
//! behind an `Arc<RwLock>`, so clones share state and the store can be used
//! from multi-threaded runtimes. Batches are validated in full before any
//! operation is applied, matching the all-or-nothing semantics of a real
//! table service.

use crate::batch::{SealedBatch, MAX_BATCH_OPERATIONS};
use crate::entity::{Entity, OperationKind};
use crate::query::{ContinuationToken, Page, PartitionQuery};
use crate::store::{StoreClient, StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type RowKey = (String, String);
type Rows = BTreeMap<RowKey, Entity>;

/// Default number of entities returned per page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// In-memory table store for tests and local development
#[derive(Clone)]
pub struct MemoryTableStore {
    structures: Arc<RwLock<HashMap<String, Rows>>>,
    next_version: Arc<AtomicU64>,
    page_size: usize,
    max_batch_operations: usize,
}

impl Default for MemoryTableStore {
    fn default() -> Self {
        Self {
            structures: Arc::new(RwLock::new(HashMap::new())),
            next_version: Arc::new(AtomicU64::new(1)),
            page_size: DEFAULT_PAGE_SIZE,
            max_batch_operations: MAX_BATCH_OPERATIONS,
        }
    }
}

impl Debug for MemoryTableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let structures = self.structures.read();
        f.debug_struct("MemoryTableStore")
            .field("structure_count", &structures.len())
            .field("page_size", &self.page_size)
            .field("max_batch_operations", &self.max_batch_operations)
            .finish()
    }
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit how many entities a single page returns (at least 1)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Override the per-batch operation limit (at least 1)
    pub fn with_max_batch_operations(mut self, limit: usize) -> Self {
        self.max_batch_operations = limit.max(1);
        self
    }

    /// Create a structure directly; convenience for bootstrapping tests
    pub fn create_structure(&self, structure: &str) {
        self.structures
            .write()
            .entry(structure.to_string())
            .or_default();
    }

    /// Snapshot of every row in a structure, in key order
    pub fn entities(&self, structure: &str) -> Vec<Entity> {
        self.structures
            .read()
            .get(structure)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of rows in a structure; 0 if it does not exist
    pub fn row_count(&self, structure: &str) -> usize {
        self.structures.read().get(structure).map_or(0, Rows::len)
    }

    fn next_version_tag(&self) -> String {
        let n = self.next_version.fetch_add(1, Ordering::Relaxed);
        format!("W/\"{n}\"")
    }

    /// Check `batch` against current rows and return the rows it would write
    ///
    /// `None` in the result means the row is deleted.
    fn stage(
        &self,
        rows: &Rows,
        batch: &SealedBatch,
    ) -> StoreResult<Vec<(RowKey, Option<Entity>)>> {
        if batch.len() > self.max_batch_operations {
            return Err(StoreError::rejected(format!(
                "batch holds {} operations, limit is {}",
                batch.len(),
                self.max_batch_operations
            )));
        }

        let mut staged: BTreeMap<RowKey, Option<Entity>> = BTreeMap::new();
        let partition = batch.partition_key();

        for op in batch {
            if Some(op.partition_key()) != partition {
                return Err(StoreError::rejected(format!(
                    "batch mixes partitions '{}' and '{}'",
                    partition.unwrap_or_default(),
                    op.partition_key()
                )));
            }

            let key = (op.partition_key().to_string(), op.row_key().to_string());
            let current = match staged.get(&key) {
                Some(pending) => pending.clone(),
                None => rows.get(&key).cloned(),
            };

            match op.kind() {
                OperationKind::Upsert => {
                    let mut entity = op.entity().clone();
                    entity.version_tag = Some(self.next_version_tag());
                    staged.insert(key, Some(entity));
                }
                OperationKind::Delete => {
                    let Some(existing) = current else {
                        return Err(StoreError::rejected(format!(
                            "row '{}'/'{}' does not exist",
                            key.0, key.1
                        )));
                    };
                    if !op.is_unconditional()
                        && existing.version_tag.as_deref() != op.expected_version()
                    {
                        return Err(StoreError::rejected(format!(
                            "version tag mismatch for '{}'/'{}'",
                            key.0, key.1
                        )));
                    }
                    staged.insert(key, None);
                }
            }
        }

        Ok(staged.into_iter().collect())
    }
}

#[async_trait]
impl StoreClient for MemoryTableStore {
    fn max_batch_operations(&self) -> usize {
        self.max_batch_operations
    }

    async fn exists(&self, structure: &str) -> StoreResult<bool> {
        Ok(self.structures.read().contains_key(structure))
    }

    async fn create_if_missing(&self, structure: &str) -> StoreResult<bool> {
        self.create_structure(structure);
        Ok(true)
    }

    async fn delete_if_exists(&self, structure: &str) -> StoreResult<bool> {
        Ok(self.structures.write().remove(structure).is_some())
    }

    async fn commit_batch(&self, structure: &str, batch: &SealedBatch) -> StoreResult<()> {
        let mut structures = self.structures.write();
        let rows = structures
            .get_mut(structure)
            .ok_or_else(|| StoreError::not_found(structure))?;

        for (key, value) in self.stage(rows, batch)? {
            match value {
                Some(entity) => {
                    rows.insert(key, entity);
                }
                None => {
                    rows.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn fetch_page(
        &self,
        structure: &str,
        query: &PartitionQuery,
        continuation: Option<&ContinuationToken>,
    ) -> StoreResult<Page> {
        let structures = self.structures.read();
        let rows = structures
            .get(structure)
            .ok_or_else(|| StoreError::not_found(structure))?;

        let start = match continuation {
            Some(token) => Bound::Excluded((token.partition_key.clone(), token.row_key.clone())),
            None => Bound::Included((query.partition_key.clone(), String::new())),
        };

        let mut matching = rows
            .range((start, Bound::Unbounded))
            .take_while(|((pk, _), _)| *pk == query.partition_key)
            .map(|(_, entity)| entity)
            .filter(|entity| query.filter.matches(entity));

        let entities: Vec<Entity> = matching.by_ref().take(self.page_size).cloned().collect();
        let continuation = match (matching.next(), entities.last()) {
            (Some(_), Some(last)) => Some(ContinuationToken::after(last)),
            _ => None,
        };

        Ok(Page::new(entities, continuation))
    }

    async fn get_by_key(
        &self,
        structure: &str,
        partition_key: &str,
        row_key: &str,
    ) -> StoreResult<Option<Entity>> {
        let structures = self.structures.read();
        let rows = structures
            .get(structure)
            .ok_or_else(|| StoreError::not_found(structure))?;
        Ok(rows
            .get(&(partition_key.to_string(), row_key.to_string()))
            .cloned())
    }
}
