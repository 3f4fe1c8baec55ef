//! Entities and the pending operations built from them
//!
//! An [`Entity`] is addressed by `(partition_key, row_key)` and carries an
//! opaque version tag used for optimistic concurrency. Properties are kept as
//! raw JSON values; no schema mapping happens in this crate.

use crate::error::{Result, TableError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Version tag that disables the concurrency check on delete.
pub const VERSION_WILDCARD: &str = "*";

/// A row in a partitioned table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Coarse-grained grouping key; atomic batches never span partitions
    pub partition_key: String,

    /// Row identifier, unique within the partition
    pub row_key: String,

    /// Concurrency token assigned by the store on every write
    ///
    /// `None` for entities that have not been read back from a store yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_tag: Option<String>,

    /// Named property values, stored and returned as-is
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, JsonValue>,
}

impl Entity {
    /// Create an entity with no version tag and no properties
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            version_tag: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_version_tag(mut self, tag: impl Into<String>) -> Self {
        self.version_tag = Some(tag.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&JsonValue> {
        self.properties.get(name)
    }

    /// Reject entities whose partition or row key is empty or blank
    pub fn validate_keys(&self) -> Result<()> {
        validate_keys(&self.partition_key, &self.row_key)
    }
}

/// Reject an empty or whitespace-only key pair before it reaches a store
pub(crate) fn validate_keys(partition_key: &str, row_key: &str) -> Result<()> {
    if partition_key.trim().is_empty() {
        return Err(TableError::invalid_argument("partition key must not be empty"));
    }
    if row_key.trim().is_empty() {
        return Err(TableError::invalid_argument("row key must not be empty"));
    }
    Ok(())
}

/// Kind of pending mutation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Insert the entity, replacing any existing row with the same keys
    Upsert,
    /// Delete the row, guarded by the entity's version tag
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Upsert => f.write_str("upsert"),
            OperationKind::Delete => f.write_str("delete"),
        }
    }
}

/// A pending mutation against one entity
///
/// Constructed only through [`Operation::upsert`] and [`Operation::delete`],
/// so a delete always carries a version tag.
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    kind: OperationKind,
    entity: Entity,
}

impl Operation {
    pub fn upsert(entity: Entity) -> Self {
        Self {
            kind: OperationKind::Upsert,
            entity,
        }
    }

    /// Build a delete; a missing or blank version tag becomes [`VERSION_WILDCARD`]
    pub fn delete(mut entity: Entity) -> Self {
        let needs_wildcard = entity
            .version_tag
            .as_deref()
            .map_or(true, |tag| tag.trim().is_empty());
        if needs_wildcard {
            entity.version_tag = Some(VERSION_WILDCARD.to_string());
        }
        Self {
            kind: OperationKind::Delete,
            entity,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn partition_key(&self) -> &str {
        &self.entity.partition_key
    }

    pub fn row_key(&self) -> &str {
        &self.entity.row_key
    }

    /// Version tag the store must match before applying a delete
    ///
    /// Always `Some` for deletes. Upserts ignore it.
    pub fn expected_version(&self) -> Option<&str> {
        match self.kind {
            OperationKind::Delete => self.entity.version_tag.as_deref(),
            OperationKind::Upsert => None,
        }
    }

    /// True when this delete skips the concurrency check
    pub fn is_unconditional(&self) -> bool {
        self.expected_version() == Some(VERSION_WILDCARD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_without_tag_uses_wildcard() {
        let op = Operation::delete(Entity::new("p", "r"));
        assert_eq!(op.kind(), OperationKind::Delete);
        assert_eq!(op.expected_version(), Some(VERSION_WILDCARD));
        assert!(op.is_unconditional());
    }

    #[test]
    fn test_delete_with_blank_tag_uses_wildcard() {
        let op = Operation::delete(Entity::new("p", "r").with_version_tag("  "));
        assert_eq!(op.expected_version(), Some(VERSION_WILDCARD));
    }

    #[test]
    fn test_delete_keeps_explicit_tag() {
        let op = Operation::delete(Entity::new("p", "r").with_version_tag("W/\"7\""));
        assert_eq!(op.expected_version(), Some("W/\"7\""));
        assert!(!op.is_unconditional());
    }

    #[test]
    fn test_upsert_has_no_expected_version() {
        let op = Operation::upsert(Entity::new("p", "r").with_version_tag("old"));
        assert_eq!(op.expected_version(), None);
    }

    #[test]
    fn test_validate_keys() {
        assert!(Entity::new("p", "r").validate_keys().is_ok());
        assert!(matches!(
            Entity::new("", "r").validate_keys(),
            Err(TableError::InvalidArgument(_))
        ));
        assert!(matches!(
            Entity::new("p", " ").validate_keys(),
            Err(TableError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_entity_serde_skips_empty_fields() {
        let json = serde_json::to_value(Entity::new("p", "r")).unwrap();
        assert_eq!(json, serde_json::json!({"partition_key": "p", "row_key": "r"}));

        let entity: Entity = serde_json::from_value(serde_json::json!({
            "partition_key": "p",
            "row_key": "r",
            "properties": {"foo": 10}
        }))
        .unwrap();
        assert_eq!(entity.property("foo"), Some(&serde_json::json!(10)));
        assert_eq!(entity.version_tag, None);
    }
}
