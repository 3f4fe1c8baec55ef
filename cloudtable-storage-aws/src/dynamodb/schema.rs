//! DynamoDB table schema constants
//!
//! ## Table Schema
//!
//! ```text
//! Table: one per structure, named after the structure
//!
//! Primary Key:
//!   - partition_key (String, Hash Key)
//!   - row_key (String, Range Key)
//!
//! Attributes:
//!   - version_tag: String - replaced with a fresh UUID on every write
//!   - every entity property as its own top-level attribute
//! ```
//!
//! Tables are created with on-demand (pay-per-request) billing.

/// Hash key attribute
pub const ATTR_PARTITION_KEY: &str = "partition_key";

/// Range key attribute
pub const ATTR_ROW_KEY: &str = "row_key";

/// Optimistic concurrency tag
pub const ATTR_VERSION_TAG: &str = "version_tag";

/// Attribute names entity properties may not use
pub const RESERVED_ATTRIBUTES: [&str; 3] = [ATTR_PARTITION_KEY, ATTR_ROW_KEY, ATTR_VERSION_TAG];

/// Items per `TransactWriteItems` call
pub const DYNAMODB_TRANSACT_LIMIT: usize = 100;

/// How long `create_if_missing` waits for a new table to become active
pub const DEFAULT_CREATE_TIMEOUT_MS: u64 = 60_000;

/// Interval between `DescribeTable` polls while waiting for a table
pub const CREATE_POLL_INTERVAL_MS: u64 = 500;

pub fn is_reserved_attribute(name: &str) -> bool {
    RESERVED_ATTRIBUTES.contains(&name)
}
