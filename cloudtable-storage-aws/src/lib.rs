//! AWS store clients for cloudtable
//!
//! - **DynamoDB** (`dynamodb` feature): one DynamoDB table per structure, with
//!   `partition_key` as the hash key and `row_key` as the range key. Batches
//!   are committed with `TransactWriteItems`, so each batch is all-or-nothing.
//!
//! ## Features
//!
//! - `dynamodb` (default): enable the DynamoDB store
//!
//! ## Usage
//!
//! ```ignore
//! use cloudtable_core::TableStructure;
//! use cloudtable_storage_aws::dynamodb::{DynamoDbConfig, DynamoDbTableStore};
//! use std::sync::Arc;
//!
//! let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
//! let store = DynamoDbTableStore::new(&sdk_config, DynamoDbConfig::default())?;
//!
//! let mut table = TableStructure::new("sampletable", Arc::new(store))?;
//! table.create_or_load_structure().await?;
//! ```

pub mod error;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

pub use error::{AwsStoreError, Result};

#[cfg(feature = "dynamodb")]
pub use dynamodb::{DynamoDbConfig, DynamoDbTableStore};

// Re-export core types for convenience
pub use cloudtable_core::{StoreClient, StoreError, StoreResult, TableStructure};
