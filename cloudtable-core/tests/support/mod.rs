//! Shared helpers for cloudtable-core integration tests
//!
//! `RecordingStore` wraps a `MemoryTableStore`, records every call it receives
//! and can be told to fail specific batch submissions.

#![allow(dead_code)]

use async_trait::async_trait;
use cloudtable_core::{
    CancellationToken, ContinuationToken, Entity, MemoryTableStore, OperationKind,
    OutcomeLogger, Page, PartitionQuery, SealedBatch, StoreClient, StoreError, StoreResult,
    TableStructure,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One submitted batch: (partition, row, kind, version tag) per operation
pub type Submission = Vec<(String, String, OperationKind, Option<String>)>;

#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryTableStore,
    submissions: Mutex<Vec<Submission>>,
    attempts: Mutex<usize>,
    failures: Mutex<HashMap<usize, StoreError>>,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
    lookups: Mutex<usize>,
    page_fetches: Mutex<usize>,
    exists_calls: Mutex<usize>,
    create_calls: Mutex<usize>,
    delete_calls: Mutex<usize>,
    exists_failure: Mutex<Option<StoreError>>,
    create_failure: Mutex<Option<StoreError>>,
    refuse_create: Mutex<bool>,
    reported_limit: Option<usize>,
}

impl RecordingStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: MemoryTableStore::new().with_max_batch_operations(capacity),
            ..Default::default()
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.inner = self.inner.clone().with_page_size(page_size);
        self
    }

    /// Report `limit` as the batch limit without changing the backing store
    pub fn with_reported_limit(mut self, limit: usize) -> Self {
        self.reported_limit = Some(limit);
        self
    }

    pub fn memory(&self) -> &MemoryTableStore {
        &self.inner
    }

    /// Fail the `attempt`-th (0-based) call to `commit_batch`
    pub fn fail_attempt(&self, attempt: usize, error: StoreError) {
        self.failures.lock().insert(attempt, error);
    }

    /// Fail the next call to `exists`
    pub fn fail_next_exists(&self, error: StoreError) {
        *self.exists_failure.lock() = Some(error);
    }

    /// Fail the next call to `create_if_missing`
    pub fn fail_next_create(&self, error: StoreError) {
        *self.create_failure.lock() = Some(error);
    }

    /// Make `create_if_missing` report that creation did not succeed
    pub fn refuse_create(&self, refuse: bool) {
        *self.refuse_create.lock() = refuse;
    }

    /// Cancel `token` once `commits` batches have been accepted
    pub fn cancel_after(&self, commits: usize, token: CancellationToken) {
        *self.cancel_after.lock() = Some((commits, token));
    }

    /// Successfully committed batches, in submission order
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    /// Row keys of every committed batch, in submission order
    pub fn submitted_rows(&self) -> Vec<Vec<String>> {
        self.submissions()
            .into_iter()
            .map(|batch| batch.into_iter().map(|(_, rk, _, _)| rk).collect())
            .collect()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock()
    }

    pub fn page_fetches(&self) -> usize {
        *self.page_fetches.lock()
    }

    pub fn exists_calls(&self) -> usize {
        *self.exists_calls.lock()
    }

    pub fn create_calls(&self) -> usize {
        *self.create_calls.lock()
    }

    pub fn delete_calls(&self) -> usize {
        *self.delete_calls.lock()
    }
}

#[async_trait]
impl StoreClient for RecordingStore {
    fn max_batch_operations(&self) -> usize {
        self.reported_limit
            .unwrap_or_else(|| self.inner.max_batch_operations())
    }

    async fn exists(&self, structure: &str) -> StoreResult<bool> {
        *self.exists_calls.lock() += 1;
        if let Some(err) = self.exists_failure.lock().take() {
            return Err(err);
        }
        self.inner.exists(structure).await
    }

    async fn create_if_missing(&self, structure: &str) -> StoreResult<bool> {
        *self.create_calls.lock() += 1;
        if let Some(err) = self.create_failure.lock().take() {
            return Err(err);
        }
        if *self.refuse_create.lock() {
            return Ok(false);
        }
        self.inner.create_if_missing(structure).await
    }

    async fn delete_if_exists(&self, structure: &str) -> StoreResult<bool> {
        *self.delete_calls.lock() += 1;
        self.inner.delete_if_exists(structure).await
    }

    async fn commit_batch(&self, structure: &str, batch: &SealedBatch) -> StoreResult<()> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            let current = *attempts;
            *attempts += 1;
            current
        };
        if let Some(err) = self.failures.lock().remove(&attempt) {
            return Err(err);
        }

        self.inner.commit_batch(structure, batch).await?;

        let submission = batch
            .iter()
            .map(|op| {
                (
                    op.partition_key().to_string(),
                    op.row_key().to_string(),
                    op.kind(),
                    op.expected_version().map(str::to_string),
                )
            })
            .collect();
        let committed = {
            let mut submissions = self.submissions.lock();
            submissions.push(submission);
            submissions.len()
        };

        if let Some((after, token)) = self.cancel_after.lock().as_ref() {
            if committed >= *after {
                token.cancel();
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
        *self.page_fetches.lock() += 1;
        self.inner.fetch_page(structure, query, continuation).await
    }

    async fn get_by_key(
        &self,
        structure: &str,
        partition_key: &str,
        row_key: &str,
    ) -> StoreResult<Option<Entity>> {
        *self.lookups.lock() += 1;
        self.inner.get_by_key(structure, partition_key, row_key).await
    }
}

/// Captures outcome messages
#[derive(Debug, Default)]
pub struct RecordingLogger {
    pub infos: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl OutcomeLogger for RecordingLogger {
    fn info(&self, message: &str) {
        self.infos.lock().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }
}

/// A created table over a fresh `RecordingStore`
pub async fn created_table(
    capacity: usize,
) -> (TableStructure<RecordingStore>, Arc<RecordingStore>) {
    let store = Arc::new(RecordingStore::new(capacity));
    let mut table = TableStructure::new("sampletable", Arc::clone(&store)).unwrap();
    assert!(table.create_or_load_structure().await.unwrap());
    (table, store)
}
