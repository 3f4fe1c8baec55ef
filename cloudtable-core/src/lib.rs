//! Batched commits against partitioned table stores
//!
//! This crate accumulates pending mutations (insert-or-replace, delete) against
//! a keyed, partitioned table and commits them as atomic groups, working around
//! the store's hard per-transaction operation limit by spilling overflow into
//! further groups that are committed in submission order.
//!
//! - [`MutationBatch`]: ordered, size-bounded, single-partition operation list
//! - [`BatchOverflowQueue`]: FIFO of sealed batches awaiting commit
//! - [`TableStructure`]: the facade callers use (insert, delete, commit, reads
//!   and the structure lifecycle)
//! - [`StoreClient`]: the seam to the backing table service
//!
//! # Implementations
//!
//! - [`MemoryTableStore`]: in-memory store for testing
//! - `cloudtable-storage-aws`: Amazon DynamoDB
//!
//! ```ignore
//! use cloudtable_core::{Entity, MemoryTableStore, TableStructure};
//! use std::sync::Arc;
//!
//! let mut table = TableStructure::new("sampletable", Arc::new(MemoryTableStore::new()))?;
//! table.create_or_load_structure().await?;
//! for i in 0..=200 {
//!     table.insert(Entity::new("partitionkey", i.to_string()).with_property("foo", 10))?;
//! }
//! table.commit().await?;
//! ```

pub mod batch;
pub mod config;
pub mod entity;
mod error;
pub mod logger;
pub mod memory;
pub mod overflow;
pub mod query;
pub mod store;
pub mod table;
pub mod tracer;

pub use batch::{
    AppendError, AppendOutcome, BatchError, MutationBatch, SealedBatch, MAX_BATCH_OPERATIONS,
};
pub use config::{validate_structure_name, TableConfig};
pub use entity::{Entity, Operation, OperationKind, VERSION_WILDCARD};
pub use error::{Result, TableError};
pub use logger::{OutcomeLogger, SilentLogger, TracingLogger};
pub use memory::MemoryTableStore;
pub use overflow::BatchOverflowQueue;
pub use query::{
    ContinuationToken, Page, PartitionQuery, PropertyCondition, QueryFilter, RowKeyCondition,
};
pub use store::{StoreClient, StoreError, StoreResult};
pub use table::{CommitSummary, CreatedState, EntityStream, TableStructure};
pub use tracer::{OperationTracer, TraceReport};
pub use tokio_util::sync::CancellationToken;
