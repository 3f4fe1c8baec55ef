//! The table facade: pending mutations, overflow rotation and ordered commits
//!
//! [`TableStructure`] owns one open [`MutationBatch`] plus a
//! [`BatchOverflowQueue`] of sealed batches. Inserts and deletes are appended
//! to the open batch; when it is full, or the next operation targets a
//! different partition, the open batch is sealed onto the queue and a fresh one
//! takes its place. [`commit`](TableStructure::commit) seals the open batch
//! onto the tail and drains the queue head to tail, one store transaction per
//! batch.
//!
//! # Failure and cancellation
//!
//! A batch is removed from the queue only after the store confirms it. If a
//! commit fails at batch `k`, batches before `k` are gone and `k..` remain
//! queued, so calling `commit` again resumes at `k` without resubmitting
//! anything that already landed. Cancellation through
//! [`commit_with_cancel`](TableStructure::commit_with_cancel) is observed only
//! between batches.
//!
//! # Concurrency
//!
//! Mutating methods take `&mut self`: one owner drives a table at a time, and
//! callers sharing an instance wrap it in a mutex. Reads take `&self` and the
//! entity stream owns its own handle to the store.

use crate::batch::{BatchError, MutationBatch};
use crate::config::{validate_structure_name, TableConfig};
use crate::entity::{validate_keys, Entity, Operation};
use crate::error::{Result, TableError};
use crate::logger::{OutcomeLogger, TracingLogger};
use crate::overflow::BatchOverflowQueue;
use crate::query::{ContinuationToken, PartitionQuery, QueryFilter};
use crate::store::StoreClient;
use crate::tracer::{self, OperationTracer};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Stream of entities produced by [`TableStructure::retrieve_all`]
pub type EntityStream = BoxStream<'static, Result<Entity>>;

/// What the table knows about the structure's existence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreatedState {
    /// Not checked yet
    #[default]
    Unknown,
    Created,
    Absent,
}

/// Totals for one successful commit call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Batches submitted to the store
    pub batches: usize,
    /// Operations across those batches
    pub operations: usize,
}

/// A partitioned table with batched, ordered commits
pub struct TableStructure<S: StoreClient> {
    name: String,
    store: Arc<S>,
    capacity: usize,
    active: Option<MutationBatch>,
    overflow: BatchOverflowQueue,
    state: CreatedState,
    deleted: bool,
    logger: Arc<dyn OutcomeLogger>,
    logging_disabled: bool,
    tracer: OperationTracer,
}

impl<S: StoreClient> fmt::Debug for TableStructure<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableStructure")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("capacity", &self.capacity)
            .field("pending_batches", &self.pending_batches())
            .field("pending_operations", &self.pending_operations())
            .finish()
    }
}

impl<S: StoreClient> TableStructure<S> {
    /// Create a table handle; nothing is sent to the store yet
    pub fn new(name: impl Into<String>, store: Arc<S>) -> Result<Self> {
        Self::from_config(store, &TableConfig::new(name))
    }

    pub fn from_config(store: Arc<S>, config: &TableConfig) -> Result<Self> {
        validate_structure_name(&config.name)?;
        let capacity = config.batch_capacity(store.max_batch_operations())?;
        Ok(Self {
            name: config.name.clone(),
            store,
            capacity,
            active: None,
            overflow: BatchOverflowQueue::new(),
            state: CreatedState::Unknown,
            deleted: false,
            logger: Arc::new(TracingLogger),
            logging_disabled: config.logging_disabled,
            tracer: OperationTracer::disabled(),
        })
    }

    pub fn with_logger(mut self, logger: Arc<dyn OutcomeLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_tracer(mut self, tracer: OperationTracer) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn set_logging_disabled(&mut self, disabled: bool) {
        self.logging_disabled = disabled;
    }

    pub fn logging_disabled(&self) -> bool {
        self.logging_disabled
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Operations per batch
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state(&self) -> CreatedState {
        self.state
    }

    pub fn tracer(&self) -> &OperationTracer {
        &self.tracer
    }

    /// Batches a commit would submit right now
    pub fn pending_batches(&self) -> usize {
        let active = self.active.as_ref().map_or(0, |b| usize::from(!b.is_empty()));
        self.overflow.len() + active
    }

    /// Operations a commit would submit right now
    pub fn pending_operations(&self) -> usize {
        self.overflow.operation_count() + self.active.as_ref().map_or(0, MutationBatch::len)
    }

    fn log_info(&self, message: &str) {
        if !self.logging_disabled {
            self.logger.info(message);
        }
    }

    fn log_error(&self, message: &str) {
        if !self.logging_disabled {
            self.logger.error(message);
        }
    }

    // ------------------------------------------------------------------
    // Structure lifecycle
    // ------------------------------------------------------------------

    /// Whether the structure exists
    ///
    /// Asks the store only while the state is [`CreatedState::Unknown`]; the
    /// answer is cached afterwards and may go stale if another process creates
    /// or deletes the structure.
    pub async fn is_created(&mut self) -> Result<bool> {
        match self.state {
            CreatedState::Created => Ok(true),
            CreatedState::Absent => Ok(false),
            CreatedState::Unknown => {
                let exists = self.store.exists(&self.name).await?;
                self.state = if exists {
                    CreatedState::Created
                } else {
                    CreatedState::Absent
                };
                Ok(exists)
            }
        }
    }

    /// Load the structure, creating it if it does not exist
    ///
    /// Returns `false` only when creation was attempted and the store did not
    /// confirm it. Store failures are returned as errors.
    pub async fn create_or_load_structure(&mut self) -> Result<bool> {
        if self.is_created().await? {
            self.log_info(&format!("{} was loaded.", self.name));
            return Ok(true);
        }

        let created = self.store.create_if_missing(&self.name).await?;
        if created {
            self.state = CreatedState::Created;
            self.deleted = false;
            self.log_info(&format!("{} was created.", self.name));
        } else {
            self.log_error(&format!("{} could not be created.", self.name));
        }
        Ok(created)
    }

    /// Delete the structure and discard every pending batch
    ///
    /// Returns `false` without a store call if the structure is known to be
    /// absent. Pending operations are dropped, not committed, and further
    /// inserts or deletes are rejected until the structure is created again.
    pub async fn delete_structure(&mut self) -> Result<bool> {
        if !self.is_created().await? {
            return Ok(false);
        }

        let deleted = self.store.delete_if_exists(&self.name).await?;
        self.state = CreatedState::Absent;
        self.deleted = true;

        let discarded = self.discard_pending();
        if discarded > 0 {
            tracing::warn!(
                table = %self.name,
                batches = discarded,
                "Discarded pending batches on structure deletion"
            );
        }
        self.log_info(&format!(
            "{} was deleted ({discarded} pending batches discarded).",
            self.name
        ));
        Ok(deleted)
    }

    fn discard_pending(&mut self) -> usize {
        let active = self.active.take().map_or(0, |b| usize::from(!b.is_empty()));
        let discarded = self.overflow.clear() + active;
        self.tracer.add(tracer::BATCHES_DISCARDED, discarded as u64);
        discarded
    }

    // ------------------------------------------------------------------
    // Pending mutations
    // ------------------------------------------------------------------

    /// Queue an insert-or-replace of `entity`
    ///
    /// Nothing reaches the store until [`commit`](Self::commit). Operations may
    /// be staged before the structure is created; only a handle whose
    /// structure was deleted through [`delete_structure`](Self::delete_structure)
    /// rejects them, until it is created again.
    pub fn insert(&mut self, entity: Entity) -> Result<()> {
        entity.validate_keys()?;
        self.append(Operation::upsert(entity))
    }

    /// Queue a delete of `entity`
    ///
    /// A missing version tag is replaced by the wildcard, so the delete skips
    /// the concurrency check.
    pub fn delete(&mut self, entity: Entity) -> Result<()> {
        entity.validate_keys()?;
        self.append(Operation::delete(entity))
    }

    fn append(&mut self, operation: Operation) -> Result<()> {
        if self.deleted {
            return Err(TableError::structure_absent(&self.name));
        }

        let capacity = self.capacity;
        let active = self
            .active
            .get_or_insert_with(|| MutationBatch::with_capacity(capacity));

        let rejected = match active.append(operation) {
            Ok(_) => return Ok(()),
            Err(rejected) => rejected,
        };

        // Rotate: seal the open batch and start a new one with the rejected op
        let (reason, operation) = rejected.into_parts();
        let sealed = std::mem::replace(active, MutationBatch::opened_with(capacity, operation));
        self.overflow.enqueue(sealed.seal());
        self.tracer.increment(tracer::BATCHES_ROTATED);

        match reason {
            BatchError::Full { capacity } => tracing::warn!(
                table = %self.name,
                capacity,
                queued = self.overflow.len(),
                "Structure now holds more than one batch of pending operations"
            ),
            BatchError::PartitionMismatch { expected, found } => tracing::debug!(
                table = %self.name,
                %expected,
                %found,
                "Partition changed, opened a new batch"
            ),
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------

    /// Submit every pending batch in FIFO order
    ///
    /// Stops at the first failure, leaving that batch and all later ones
    /// queued for the next call.
    pub async fn commit(&mut self) -> Result<CommitSummary> {
        self.drain(None).await
    }

    /// Like [`commit`](Self::commit), checking `cancel` before each batch
    pub async fn commit_with_cancel(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<CommitSummary> {
        self.drain(Some(cancel)).await
    }

    async fn drain(&mut self, cancel: Option<&CancellationToken>) -> Result<CommitSummary> {
        match self.active.take() {
            Some(active) if !active.is_empty() => self.overflow.enqueue(active.seal()),
            other => self.active = other,
        }

        let mut summary = CommitSummary::default();
        let mut recycled = None;

        while let Some(batch) = self.overflow.front() {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                self.log_info(&format!(
                    "{} commit cancelled with {} batches pending.",
                    self.name,
                    self.overflow.len()
                ));
                return Err(TableError::Cancelled {
                    committed: summary.batches,
                    remaining: self.overflow.len(),
                });
            }

            let operations = batch.len();
            self.log_info(&format!("{} Batch count: {operations}", self.name));

            if operations > 0 {
                if let Err(source) = self.store.commit_batch(&self.name, batch).await {
                    self.tracer.increment(tracer::BATCHES_FAILED);
                    self.log_error(&format!(
                        "{} batch {} failed: {source}",
                        self.name, summary.batches
                    ));
                    return Err(TableError::CommitFailed {
                        position: summary.batches,
                        remaining: self.overflow.len(),
                        source,
                    });
                }

                summary.batches += 1;
                summary.operations += operations;
                self.tracer.increment(tracer::BATCHES_COMMITTED);
                self.tracer
                    .add(tracer::OPERATIONS_COMMITTED, operations as u64);
                self.log_info(&format!("Batch executed in {}", self.name));
            }

            recycled = self.overflow.dequeue().map(|done| done.into_cleared());
        }

        // Reuse the last committed buffer as the open batch
        if self.active.is_none() {
            self.active = recycled;
        }
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Stream every entity of a partition, optionally narrowed by `filter`
    ///
    /// Pages are fetched lazily as the stream is polled. The stream owns its
    /// own handle to the store, so calling this again restarts the scan. An
    /// empty partition yields an empty stream.
    pub fn retrieve_all(
        &self,
        partition_key: &str,
        filter: Option<QueryFilter>,
    ) -> Result<EntityStream>
    where
        S: 'static,
    {
        if partition_key.trim().is_empty() {
            return Err(TableError::invalid_argument("partition key must not be empty"));
        }

        let query = Arc::new(PartitionQuery::new(partition_key, filter));
        self.log_info(&format!(
            "{} will retrieve data with condition: {query}",
            self.name
        ));

        let store = Arc::clone(&self.store);
        let name: Arc<str> = Arc::from(self.name.as_str());
        let counters = self.tracer.clone();

        enum Cursor {
            Start,
            Next(ContinuationToken),
            Done,
        }

        let pages = stream::unfold(Cursor::Start, move |cursor| {
            let store = Arc::clone(&store);
            let name = Arc::clone(&name);
            let query = Arc::clone(&query);
            let counters = counters.clone();
            async move {
                let token = match cursor {
                    Cursor::Start => None,
                    Cursor::Next(token) => Some(token),
                    Cursor::Done => return None,
                };

                let page = match store.fetch_page(&name, &query, token.as_ref()).await {
                    Ok(page) => page,
                    Err(e) => return Some((Err(TableError::from(e)), Cursor::Done)),
                };

                for entity in &page.entities {
                    tracing::debug!(
                        table = %name,
                        partition_key = %entity.partition_key,
                        row_key = %entity.row_key,
                        "Retrieving entity"
                    );
                }
                counters.add(tracer::ENTITIES_RETRIEVED, page.entities.len() as u64);

                let next = match page.continuation {
                    Some(token) => Cursor::Next(token),
                    None => Cursor::Done,
                };
                Some((Ok(page.entities), next))
            }
        });

        Ok(pages
            .map_ok(|entities| {
                stream::iter(entities.into_iter().map(Ok::<Entity, TableError>))
            })
            .try_flatten()
            .boxed())
    }

    /// Point lookup; `Ok(None)` when the row does not exist
    pub async fn retrieve(&self, partition_key: &str, row_key: &str) -> Result<Option<Entity>> {
        validate_keys(partition_key, row_key)?;
        let entity = self
            .store
            .get_by_key(&self.name, partition_key, row_key)
            .await?;
        if entity.is_some() {
            self.tracer.increment(tracer::ENTITIES_RETRIEVED);
        }
        Ok(entity)
    }

    /// Look up the stored version of `entity` by its keys
    pub async fn retrieve_entity(&self, entity: &Entity) -> Result<Option<Entity>> {
        self.retrieve(&entity.partition_key, &entity.row_key).await
    }
}
